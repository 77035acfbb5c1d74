use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The persistent belief document ("market mind"). Modeled as a JSON value
/// with narrow typed accessors for the keys the rest of the system reads,
/// per the tagged-sum-JSON design note: the document itself is free-form,
/// but required top-level keys are validated on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveState(pub Value);

impl CognitiveState {
    /// The empty skeleton seeded when neither the live document nor a
    /// template file exists on disk.
    pub fn empty_skeleton() -> Self {
        Self(json!({
            "version": "1.0",
            "last_updated": Value::Null,
            "updated_by": "manual_init",
            "market_beliefs": {},
            "strategy_weights": {},
            "lessons_learned": [],
            "bias_awareness": [],
            "active_watchlist": [],
            "user_inputs": [],
            "performance_memory": {},
        }))
    }

    pub fn regime(&self) -> Option<&str> {
        self.0.get("market_beliefs")?.get("regime")?.as_str()
    }

    pub fn bias_awareness(&self) -> &[Value] {
        self.0
            .get("bias_awareness")
            .and_then(Value::as_array)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Returns human-readable warnings for missing/mistyped required keys.
    /// Never fails: an absent or malformed document just yields warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let required_maps = ["market_beliefs", "strategy_weights"];
        let required_lists = ["lessons_learned", "bias_awareness"];

        for key in required_maps {
            match self.0.get(key) {
                Some(Value::Object(_)) => {}
                Some(_) => warnings.push(format!("'{key}' should be an object")),
                None => warnings.push(format!("missing required key '{key}'")),
            }
        }
        for key in required_lists {
            match self.0.get(key) {
                Some(Value::Array(_)) => {}
                Some(_) => warnings.push(format!("'{key}' should be a list")),
                None => warnings.push(format!("missing required key '{key}'")),
            }
        }
        warnings
    }

    pub fn stamp(&mut self, changed_by: &str, now: DateTime<Utc>) {
        if let Value::Object(map) = &mut self.0 {
            map.insert("last_updated".to_string(), json!(now.to_rfc3339()));
            map.insert("updated_by".to_string(), json!(changed_by));
        }
    }
}

/// Deep-merges `patch` into `base`: where both sides are objects, recurse
/// key by key; otherwise `patch` replaces `base`. Never mutates `base` —
/// always returns a fresh value. Idempotent in `patch`:
/// `merge(merge(b,p),p) == merge(b,p)`.
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut merged = base_map.clone();
            for (key, patch_value) in patch_map {
                let next = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => patch_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

/// An append-only audit row recorded on every successful cognitive-state
/// write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindHistory {
    pub id: Option<i64>,
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    pub previous_state: Value,
    pub new_state: Value,
    pub change_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_merge_recurses_into_nested_objects() {
        let base = json!({"market_beliefs": {"regime": "ranging", "confidence": 0.5}});
        let patch = json!({"market_beliefs": {"regime": "bullish"}});
        let merged = deep_merge(&base, &patch);
        assert_eq!(merged["market_beliefs"]["regime"], "bullish");
        assert_eq!(merged["market_beliefs"]["confidence"], 0.5);
    }

    #[test]
    fn test_deep_merge_non_map_conflict_patch_wins() {
        let base = json!({"lessons_learned": ["a", "b"]});
        let patch = json!({"lessons_learned": ["c"]});
        let merged = deep_merge(&base, &patch);
        assert_eq!(merged["lessons_learned"], json!(["c"]));
    }

    #[test]
    fn test_deep_merge_does_not_mutate_base() {
        let base = json!({"a": 1});
        let patch = json!({"a": 2});
        let _ = deep_merge(&base, &patch);
        assert_eq!(base["a"], 1);
    }

    #[test]
    fn test_deep_merge_is_idempotent_in_patch() {
        let base = json!({"market_beliefs": {"regime": "ranging"}});
        let patch = json!({"market_beliefs": {"regime": "bullish"}});
        let once = deep_merge(&base, &patch);
        let twice = deep_merge(&once, &patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_validate_reports_missing_keys() {
        let state = CognitiveState(json!({}));
        let warnings = state.validate();
        assert_eq!(warnings.len(), 4);
    }

    #[test]
    fn test_validate_passes_well_formed_skeleton() {
        let state = CognitiveState::empty_skeleton();
        assert!(state.validate().is_empty());
    }
}
