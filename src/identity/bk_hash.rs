//! Business-key hash (BK): a deterministic 128-bit fingerprint of a
//! record's identity-defining fields (§4.1).

use crate::error::{SyncError, SyncResult};
use crate::model::Record;
use crate::model::record::value_to_canonical_string;

/// Compute the BK hash for `record` over `business_key_fields`.
///
/// The canonical string is `[entity_name "|"] field=value | field=value | ...`
/// with the `field=value` pairs sorted lexicographically as whole strings
/// (not by field name alone) before joining — this matches the source's own
/// canonicalization, where the full pair is sorted.
pub fn generate(
    record: &Record,
    business_key_fields: &[String],
    entity_name: Option<&str>,
) -> SyncResult<String> {
    if business_key_fields.is_empty() {
        return Err(SyncError::identity_generation(
            "business_key_fields must not be empty",
        ));
    }

    let mut pairs = Vec::with_capacity(business_key_fields.len());
    for field in business_key_fields {
        let value = record.get(field);
        let is_null = matches!(value, None | Some(serde_json::Value::Null));
        if is_null {
            return Err(SyncError::identity_generation(format!(
                "business key field '{field}' is missing or null"
            )));
        }
        let rendered = value_to_canonical_string(value.unwrap());
        pairs.push(format!("{field}={rendered}"));
    }

    pairs.sort();
    let mut canonical = pairs.join("|");
    if let Some(entity) = entity_name {
        canonical = format!("{entity}|{canonical}");
    }

    Ok(hex128(xxhash_rust::xxh3::xxh3_128(canonical.as_bytes())))
}

pub fn generate_batch(
    records: &[Record],
    business_key_fields: &[String],
    entity_name: Option<&str>,
) -> Vec<SyncResult<String>> {
    records
        .iter()
        .map(|r| generate(r, business_key_fields, entity_name))
        .collect()
}

/// Validate that a BK hash is a well-formed 32-character lowercase hex string.
pub fn validate(bk_hash: &str) -> bool {
    bk_hash.len() == 32 && bk_hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

fn hex128(value: u128) -> String {
    format!("{value:032x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.insert((*k).to_string(), v.clone());
        }
        r
    }

    #[test]
    fn deterministic_across_calls() {
        let r = record(&[("item_id", json!("A"))]);
        let fields = vec!["item_id".to_string()];
        let a = generate(&r, &fields, Some("inventory_items")).unwrap();
        let b = generate(&r, &fields, Some("inventory_items")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn fails_on_missing_field() {
        let r = record(&[("other", json!("x"))]);
        let fields = vec!["item_id".to_string()];
        assert!(generate(&r, &fields, None).is_err());
    }

    #[test]
    fn fails_on_null_field() {
        let r = record(&[("item_id", serde_json::Value::Null)]);
        let fields = vec!["item_id".to_string()];
        assert!(generate(&r, &fields, None).is_err());
    }

    #[test]
    fn fails_on_empty_field_list() {
        let r = record(&[("item_id", json!("A"))]);
        assert!(generate(&r, &[], None).is_err());
    }

    #[test]
    fn independent_of_other_field_insertion_order() {
        let mut r1 = Record::new();
        r1.insert("item_id".to_string(), json!("A"));
        r1.insert("qty".to_string(), json!(1));

        let mut r2 = Record::new();
        r2.insert("qty".to_string(), json!(1));
        r2.insert("item_id".to_string(), json!("A"));

        let fields = vec!["item_id".to_string()];
        assert_eq!(
            generate(&r1, &fields, None).unwrap(),
            generate(&r2, &fields, None).unwrap()
        );
    }

    #[test]
    fn validates_well_formed_hash() {
        let r = record(&[("item_id", json!("A"))]);
        let hash = generate(&r, &vec!["item_id".to_string()], None).unwrap();
        assert!(validate(&hash));
        assert!(!validate("not-hex"));
        assert!(!validate(&hash[..30]));
    }
}
