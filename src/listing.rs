//! Packing of search results into reply payloads.

/// Separator between filenames within one listing payload.
pub const NAME_SEPARATOR: char = '\n';

/// Packs `names` into the minimum number of payloads, each strictly shorter than
///  `max_payload_len`. A payload is flushed and a new one started whenever appending the
///  next name (plus separator) would reach the limit.
///
/// Zero names produce exactly one empty payload, so the client can distinguish "no
///  results" from "no reply received".
///
/// A single name longer than the limit is emitted on a payload of its own rather than
///  dropped - with the limit at the wire maximum such a name cannot have been uploaded
///  in the first place.
pub fn paginate<'a>(names: impl IntoIterator<Item = &'a str>, max_payload_len: usize) -> Vec<String> {
    let mut payloads = Vec::new();
    let mut current = String::new();

    for name in names {
        if !current.is_empty() && current.len() + 1 + name.len() >= max_payload_len {
            payloads.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(NAME_SEPARATOR);
        }
        current.push_str(name);
    }

    if !current.is_empty() || payloads.is_empty() {
        payloads.push(current);
    }
    payloads
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::no_names(vec![], 10, vec![""])]
    #[case::one_name(vec!["abc"], 10, vec!["abc"])]
    #[case::all_fit(vec!["ab", "cd", "ef"], 10, vec!["ab\ncd\nef"])]
    #[case::split_on_boundary(vec!["ab", "cd", "ef"], 8, vec!["ab\ncd", "ef"])]
    #[case::one_per_payload(vec!["abcd", "efgh"], 6, vec!["abcd", "efgh"])]
    #[case::oversized_name_alone(vec!["ab", "this-is-long", "cd"], 8, vec!["ab", "this-is-long", "cd"])]
    fn test_paginate(#[case] names: Vec<&str>, #[case] max_len: usize, #[case] expected: Vec<&str>) {
        assert_eq!(paginate(names, max_len), expected);
    }

    /// Concatenating all payloads in order reproduces exactly the input names, and every
    ///  payload (of names that individually fit) stays under the limit.
    #[test]
    fn test_paginate_is_lossless_and_bounded() {
        let names: Vec<String> = (0..100).map(|i| format!("file-{:03}.dat", i)).collect();
        let max_len = 100;

        let payloads = paginate(names.iter().map(String::as_str), max_len);

        assert!(payloads.len() > 1);
        for payload in &payloads {
            assert!(payload.len() < max_len);
        }

        let reassembled: Vec<&str> = payloads
            .iter()
            .flat_map(|p| p.split(NAME_SEPARATOR))
            .collect();
        assert_eq!(reassembled, names);
    }
}
