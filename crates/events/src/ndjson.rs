//! Newline-delimited JSON framing for bulk ingestion.

use serde::Serialize;

use crate::FrameError;

/// Serialises `records` into one buffer, one JSON document per line.
///
/// Records are separated by a single `\n`; there is no trailing newline after
/// the last record and an empty input yields an empty buffer. If any record
/// fails to serialise the whole batch fails and nothing is returned.
pub fn to_ndjson<I>(records: I) -> Result<Vec<u8>, FrameError>
where
    I: IntoIterator,
    I::Item: Serialize,
{
    let mut out = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        if index > 0 {
            out.push(b'\n');
        }
        serde_json::to_writer(&mut out, &record).map_err(|source| FrameError { index, source })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Serialize)]
    struct Person {
        name: &'static str,
        age: u32,
    }

    #[test]
    fn frames_records_without_trailing_newline() {
        let people = [Person { name: "James", age: 30 }, Person { name: "Felix", age: 25 }];
        let out = to_ndjson(&people).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"name\":\"James\",\"age\":30}\n{\"name\":\"Felix\",\"age\":25}"
        );
    }

    #[test]
    fn empty_batch_is_empty_buffer() {
        let none: Vec<Person> = Vec::new();
        assert!(to_ndjson(&none).unwrap().is_empty());
    }

    #[test]
    fn n_records_have_n_minus_one_separators() {
        let rows: Vec<u32> = (0..5).collect();
        let out = to_ndjson(&rows).unwrap();
        assert_eq!(out.iter().filter(|b| **b == b'\n').count(), 4);
        assert_ne!(out.last(), Some(&b'\n'));
    }

    #[test]
    fn one_bad_record_fails_the_batch() {
        let good: BTreeMap<(u8, u8), u8> = BTreeMap::new();
        let mut bad = BTreeMap::new();
        bad.insert((1_u8, 2_u8), 3_u8);
        let err = to_ndjson([good, bad]).unwrap_err();
        assert_eq!(err.index, 1);
    }
}
