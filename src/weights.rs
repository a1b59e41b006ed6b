//! Validation shared by every named weight set.

use std::collections::HashMap;

use crate::error::{ScoringError, ScoringResult};

/// Allowed deviation of a weight set's sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Check that every weight is finite and non-negative and that they sum to
/// 1.0 within [`WEIGHT_SUM_TOLERANCE`].
pub(crate) fn check_weights(kind: &str, entries: &[(&str, f64)]) -> ScoringResult<()> {
    for (key, value) in entries {
        if !value.is_finite() || *value < 0.0 {
            return Err(ScoringError::InvalidWeights {
                message: format!("{} weight '{}' must be a non-negative number, got {}", kind, key, value),
            });
        }
    }

    let total: f64 = entries.iter().map(|(_, v)| v).sum();
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE + f64::EPSILON {
        return Err(ScoringError::InvalidWeights {
            message: format!("{} weights must sum to 1.0 (got {:.4})", kind, total),
        });
    }

    Ok(())
}

/// Pull exactly `keys` out of a weight map, in order.
///
/// Missing and unknown keys are both rejected.
pub(crate) fn take_weights<const N: usize>(
    kind: &str,
    map: &HashMap<String, f64>,
    keys: [&str; N],
) -> ScoringResult<[f64; N]> {
    if let Some(unknown) = map.keys().find(|k| !keys.contains(&k.as_str())) {
        return Err(ScoringError::InvalidWeights {
            message: format!("unknown {} weight '{}'; expected {}", kind, unknown, keys.join(", ")),
        });
    }

    let mut values = [0.0; N];
    for (slot, key) in values.iter_mut().zip(keys) {
        *slot = *map.get(key).ok_or_else(|| ScoringError::InvalidWeights {
            message: format!("missing {} weight '{}'; expected {}", kind, key, keys.join(", ")),
        })?;
    }
    Ok(values)
}

/// Parse a `key=value,key=value` list into a weight map.
pub fn parse_weight_list(raw: &str) -> ScoringResult<HashMap<String, f64>> {
    let mut map = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| ScoringError::InvalidWeights {
            message: format!("expected key=value, got '{}'", pair),
        })?;
        let value: f64 = value.trim().parse().map_err(|_| ScoringError::InvalidWeights {
            message: format!("weight '{}' is not a number: '{}'", key.trim(), value.trim()),
        })?;
        map.insert(key.trim().to_string(), value);
    }
    Ok(map)
}
