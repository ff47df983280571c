//! What the processor computes, independent of the buffer ABI.

use sha2::{Digest, Sha256};

/// The only config this processor accepts.
pub const CONFIG: &[u8] = b"IntelliX";

fn check_config(config: &[u8]) -> Result<(), String> {
    if config == CONFIG {
        Ok(())
    } else {
        Err(format!("invalid config: {:?}", String::from_utf8_lossy(config)))
    }
}

/// Fetch the document named by `request` (a URL).
pub fn prepare_data(
    config: &[u8],
    request: &[u8],
    fetch: impl FnOnce(&str) -> Result<Vec<u8>, String>,
) -> Result<Vec<u8>, String> {
    check_config(config)?;
    let url = std::str::from_utf8(request).map_err(|_| "request is not a UTF-8 URL".to_string())?;
    if url.is_empty() {
        return Err("empty request".to_string());
    }
    fetch(url)
}

/// Read `market_data.current_price.usd` from a history document.
pub fn usd_price(document: &[u8]) -> Result<f64, String> {
    let value: serde_json::Value =
        serde_json::from_slice(document).map_err(|e| format!("invalid market data: {e}"))?;
    value["market_data"]["current_price"]["usd"]
        .as_f64()
        .ok_or_else(|| "market_data.current_price.usd missing".to_string())
}

/// Reduce prepared documents to a little-endian `f64` and its SHA-256.
///
/// `first` takes the price of the first document; `mean` averages all of them.
pub fn aggregate(config: &[u8], data: &[&[u8]], request: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String> {
    check_config(config)?;
    if data.is_empty() {
        return Err("no data".to_string());
    }

    let price = match request {
        b"first" => usd_price(data[0])?,
        b"mean" => {
            let prices = data
                .iter()
                .map(|document| usd_price(document))
                .collect::<Result<Vec<_>, _>>()?;
            prices.iter().sum::<f64>() / prices.len() as f64
        }
        other => {
            return Err(format!(
                "unsupported request: {:?}",
                String::from_utf8_lossy(other)
            ))
        }
    };

    let result = price.to_le_bytes().to_vec();
    let digest = Sha256::digest(&result).to_vec();
    Ok((result, digest))
}
