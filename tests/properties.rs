//! Property tests for version parsing and line rewriting

use proptest::prelude::*;
use release_patcher::document::TextDocument;
use release_patcher::{apply_rules, parse_version, FormatError, RewriteRule, VersionIdentifier};

fn header_rules() -> Vec<RewriteRule> {
    vec![
        RewriteRule::new("#define VERSION_MAJOR ", |v| {
            format!("#define VERSION_MAJOR {}", v.major)
        }),
        RewriteRule::new("#define VERSION_MINOR ", |v| {
            format!("#define VERSION_MINOR {}", v.minor)
        }),
        RewriteRule::new("#define VERSION_STR ", |v| {
            format!("#define VERSION_STR \"{}\"", v)
        }),
    ]
}

fn version() -> impl Strategy<Value = VersionIdentifier> {
    (0u64..100_000, 0u64..100_000, 0u64..100_000)
        .prop_map(|(major, minor, patch)| VersionIdentifier::new(major, minor, patch))
}

/// Mix of marker lines and arbitrary text lines.
fn line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[^\r\n]{0,40}",
        (0u64..50).prop_map(|n| format!("#define VERSION_MAJOR {n}")),
        (0u64..50).prop_map(|n| format!("#define VERSION_MINOR {n}")),
        "[0-9.]{0,8}".prop_map(|s| format!("#define VERSION_STR \"{s}\"")),
    ]
}

proptest! {
    #[test]
    fn valid_triplets_round_trip(major in any::<u64>(), minor in any::<u64>(), patch in any::<u64>()) {
        let text = format!("{major}.{minor}.{patch}");
        let v = parse_version(&text).unwrap();
        prop_assert_eq!((v.major, v.minor, v.patch), (major, minor, patch));
        prop_assert_eq!(v.to_string(), text);
    }

    #[test]
    fn wrong_segment_count_rejected(segments in prop::collection::vec(0u64..1000, 0..8)) {
        prop_assume!(segments.len() != 3);
        let text = segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        let result = parse_version(&text);
        prop_assert!(
            matches!(result, Err(FormatError::SegmentCount { .. })),
            "{:?} -> {:?}",
            text,
            result
        );
    }

    #[test]
    fn non_numeric_segment_rejected(
        good in 0u64..1000,
        bad in "[a-zA-Z_+-][a-zA-Z0-9_+-]{0,5}",
        position in 0usize..3,
    ) {
        let mut parts = vec![good.to_string(), good.to_string(), good.to_string()];
        parts[position] = bad;
        let text = parts.join(".");
        let result = parse_version(&text);
        prop_assert!(
            matches!(result, Err(FormatError::InvalidSegment { .. })),
            "{:?} -> {:?}",
            text,
            result
        );
    }

    #[test]
    fn length_preserved(lines in prop::collection::vec(line(), 0..40), v in version()) {
        let out = apply_rules(&lines, &v, &header_rules());
        prop_assert_eq!(out.len(), lines.len());
    }

    #[test]
    fn idempotent(lines in prop::collection::vec(line(), 0..40), v in version()) {
        let rules = header_rules();
        let once = apply_rules(&lines, &v, &rules);
        let twice = apply_rules(&once, &v, &rules);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn non_matching_lines_untouched(lines in prop::collection::vec(line(), 0..40), v in version()) {
        let rules = header_rules();
        let out = apply_rules(&lines, &v, &rules);
        for (before, after) in lines.iter().zip(&out) {
            if !rules.iter().any(|r| r.matches(before)) {
                prop_assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn document_without_markers_is_byte_identical(
        lines in prop::collection::vec("[^\r\n#]{0,40}", 0..20),
        crlf in any::<bool>(),
        trailing in any::<bool>(),
        v in version(),
    ) {
        let sep = if crlf { "\r\n" } else { "\n" };
        let mut text = lines.join(sep);
        if trailing && !lines.is_empty() {
            text.push_str(sep);
        }

        let mut doc = TextDocument::parse("doc.txt", &text);
        doc.apply(&v, &header_rules()).unwrap();
        prop_assert_eq!(doc.render(), text);
    }

    #[test]
    fn unmatched_lines_survive_stray_carriage_returns(
        noise in prop::collection::vec("(\r|[^\r\n]){0,40}", 1..20),
        marker_at in any::<prop::sample::Index>(),
        v in version(),
    ) {
        let rules = header_rules();
        prop_assume!(noise.iter().all(|l| !rules.iter().any(|r| r.matches(l))));

        let mut lines = noise;
        let at = marker_at.index(lines.len() + 1);
        lines.insert(at, "#define VERSION_MAJOR 0".to_string());
        let text = lines.join("\n");

        let mut doc = TextDocument::parse("doc.h", &text);
        doc.apply(&v, &rules).unwrap();
        let rendered = doc.render();
        let out: Vec<&str> = rendered.split('\n').collect();

        prop_assert_eq!(out.len(), lines.len());
        prop_assert_eq!(out[at], format!("#define VERSION_MAJOR {}", v.major));
        for (i, (before, after)) in lines.iter().zip(&out).enumerate() {
            if i != at {
                prop_assert_eq!(before.as_str(), *after);
            }
        }
    }
}
