use std::collections::BTreeSet;

use darkfog_core::fixture::SaveBuilder;
use darkfog_core::header::{FILE_SIZE_OFFSET, FieldTable};
use darkfog_core::hive::walk_stars;
use darkfog_core::SaveFile;
use proptest::prelude::*;

fn arb_case() -> impl Strategy<Value = (Vec<usize>, BTreeSet<usize>)> {
    proptest::collection::vec(1..=2usize, 1..=6).prop_flat_map(|hives| {
        let n = hives.len();
        (Just(hives), proptest::collection::btree_set(0..n, 0..=n))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn splice_keeps_count_and_omits_exactly(case in arb_case()) {
        let (hives, omit) = case;
        let n = hives.len();
        let source = SaveFile::from_bytes(SaveBuilder::new(n).hives_per_star(&hives).build()).unwrap();
        let target_fixture = SaveBuilder::new(n).peace_mode(true).build_with_layout();
        let target = SaveFile::from_bytes(target_fixture.bytes.clone()).unwrap();

        let (out, stats) = target.inject_from(&source.hive_source().unwrap(), &omit).unwrap();
        let bytes = out.bytes();

        let count_offset = target_fixture.region.count_offset;
        let count = i32::from_le_bytes(bytes[count_offset..count_offset + 4].try_into().unwrap());
        prop_assert_eq!(count as usize, n);

        let stars = walk_stars(bytes, count_offset + 4, n).unwrap();
        let bare = stars.iter().filter(|s| s.is_bare_sentinel()).count();
        prop_assert_eq!(bare, omit.len());
        prop_assert_eq!(stats.stars_omitted, omit.len());

        let size = i64::from_le_bytes(bytes[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 8].try_into().unwrap());
        prop_assert_eq!(size as usize, bytes.len());
        prop_assert!(!FieldTable::decode(bytes).unwrap().is_peace_mode());
    }

    #[test]
    fn convert_never_changes_length(peace_header in any::<bool>(), peace_desc in any::<bool>()) {
        let original = SaveBuilder::new(3).peace_flags(peace_header, peace_desc).build();
        let mut save = SaveFile::from_bytes(original.clone()).unwrap();
        let changed = save.convert_to_dark_fog(None).unwrap();
        prop_assert_eq!(changed, peace_header || peace_desc);
        prop_assert_eq!(save.bytes().len(), original.len());
        prop_assert!(!save.is_peace_mode());
        if !changed {
            prop_assert_eq!(save.bytes(), original.as_slice());
        }
    }
}
