use crate::domain::prediction::PredictionRequest;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Rebuild objects with keys inserted in sorted order, at every depth
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|k| (k.clone(), canonicalize(&map[k])))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Cache key of a request: SHA-256 hex over its canonical JSON form.
///
/// Two requests that differ only in key order share a fingerprint.
pub fn fingerprint(request: &PredictionRequest) -> String {
    let factors = match &request.factors {
        Some(factors) => json!(
            factors
                .iter()
                .map(|f| json!({"input_data": Value::Object(f.input_data.clone()), "weight": f.weight}))
                .collect::<Vec<_>>()
        ),
        None => Value::Null,
    };
    let canonical = json!({
        "league": request.league.code(),
        "prediction_type": request.prediction_type.as_str(),
        "input_data": Value::Object(request.input_data.clone()),
        "factors": factors,
    });
    hex::encode(Sha256::digest(canonicalize(&canonical).to_string().as_bytes()))
}
