#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use rand::{SeedableRng, rngs::StdRng};

    use crate::{
        error::IndexError,
        index::{
            header::{PageHeader, decode_top_head, encode_top_head},
            key::{KeyColumn, KeySchema},
            layout::{LEAF_HEADER_LEN, ROOT_RECORD_AREA, START_LEN},
            mutate::promotion_height,
            plan::{ScanPlan, StartBound, StopCondition},
            predicate::{CompareOp, Operand, Predicate, like_match, like_prefix, prefix_successor},
            record::{Links, NodeRef, Record, RecordKind, RecordPtr, Rid},
        },
        storage::page::{PAGE_SIZE, PageId},
        types::{datatype::DataType, value::Value},
    };

    fn int_schema() -> KeySchema {
        KeySchema::new(vec![KeyColumn::asc("k", DataType::Int)])
    }

    fn ptr(block: u32, offset: u32) -> RecordPtr {
        RecordPtr::new(PageId(block), offset)
    }

    // -------- codec --------

    #[test]
    fn null_pointer_is_all_zero() {
        assert_eq!(NodeRef::Null.encode(), [0u8; 8]);
        assert_eq!(NodeRef::decode(&[0u8; 8]), NodeRef::Null);

        let at = NodeRef::At(ptr(3, 120));
        assert_eq!(NodeRef::decode(&at.encode()), at);
        assert_eq!(&at.encode()[..4], &3i32.to_le_bytes());
    }

    #[test]
    fn leaf_record_layout() {
        let schema = int_schema();
        let key = schema.encode_key(&[Value::Int32(42)]).unwrap();
        let links = Links {
            prev: ptr(0, 17).into(),
            next: NodeRef::Null,
            up: ptr(1, 9).into(),
        };
        let rid = Rid::new(0, 0, 1, 3);
        let bytes = Record::encode_leaf(links, rid, &key);

        assert_eq!(bytes.len(), LEAF_HEADER_LEN + 5);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[25..29], &0i32.to_le_bytes());
        assert_eq!(&bytes[37..41], &3i32.to_le_bytes());
        // null flag then payload
        assert_eq!(&bytes[41..], &[0, 42, 0, 0, 0]);

        let mut page = vec![0u8; 200];
        page[50..50 + bytes.len()].copy_from_slice(&bytes);
        let record = Record::decode(&page, ptr(2, 50), &schema).unwrap();

        assert_eq!(record.links, links);
        assert_eq!(
            record.kind,
            RecordKind::Leaf {
                rid,
                key: vec![Value::Int32(42)]
            }
        );
        assert!(record.is_live_leaf());
    }

    #[test]
    fn start_record_has_no_key() {
        let bytes = Record::encode_start(Links::default(), ptr(0, 17).into());
        assert_eq!(bytes.len(), START_LEN);

        let record = Record::decode(&bytes, ptr(0, 0), &int_schema()).unwrap();
        assert!(record.is_start());
        assert_eq!(record.key(), None);
        assert_eq!(record.down(), ptr(0, 17).into());
    }

    #[test]
    fn unknown_tag_is_corruption() {
        let mut page = vec![0u8; 64];
        page[0] = 9;
        let err = Record::decode(&page, ptr(4, 0), &int_schema()).unwrap_err();
        assert!(matches!(err, IndexError::CorruptedPage { page_id: PageId(4), .. }));
    }

    #[test]
    fn truncated_key_is_corruption() {
        let schema = KeySchema::new(vec![KeyColumn::asc("s", DataType::Varchar { max_len: None })]);
        let key = schema.encode_key(&[Value::String("abcdef".into())]).unwrap();
        let bytes = Record::encode_leaf(Links::default(), Rid::new(0, 0, 0, 0), &key);

        let cut = &bytes[..bytes.len() - 2];
        assert!(matches!(
            Record::decode(cut, ptr(1, 0), &schema),
            Err(IndexError::CorruptedPage { .. })
        ));
    }

    #[test]
    fn key_codec_handles_nulls_and_strings() {
        let schema = KeySchema::new(vec![
            KeyColumn::asc("a", DataType::Long),
            KeyColumn::desc("b", DataType::Varchar { max_len: Some(8) }),
            KeyColumn::asc("c", DataType::Double),
        ]);
        let values = vec![Value::Int32(7), Value::String("héllo".into()), Value::Null];

        let bytes = schema.encode_key(&values).unwrap();
        // LONG: 1 + 8, VARCHAR: 1 + 4 + 6 bytes of UTF-8, NULL: flag only
        assert_eq!(bytes.len(), 9 + 11 + 1);
        assert_eq!(*bytes.last().unwrap(), 1);

        let mut input = bytes.as_slice();
        let decoded = schema.decode_key(&mut input, PageId(0)).unwrap();
        assert!(input.is_empty());
        assert_eq!(
            decoded,
            vec![Value::Int64(7), Value::String("héllo".into()), Value::Null]
        );
    }

    #[test]
    fn key_codec_rejects_misfits() {
        let schema = KeySchema::new(vec![
            KeyColumn::asc("a", DataType::Int),
            KeyColumn::asc("b", DataType::Varchar { max_len: Some(3) }),
        ]);

        let wrong_count = schema.encode_key(&[Value::Int32(1)]);
        let wrong_type = schema.encode_key(&[Value::String("x".into()), Value::String("y".into())]);
        let too_long = schema.encode_key(&[Value::Int32(1), Value::String("abcd".into())]);
        let overflow = schema.encode_key(&[Value::Int64(i64::MAX), Value::Null]);

        for result in [wrong_count, wrong_type, too_long, overflow] {
            assert!(matches!(result, Err(IndexError::Encoding(_))));
        }
    }

    #[test]
    fn page_header_layout() {
        let header = PageHeader::fresh(2, true, true);
        assert_eq!(header.free_offset as usize, ROOT_RECORD_AREA);

        let bytes = header.encode();
        assert_eq!(&bytes[0..4], &2i32.to_le_bytes());
        assert_eq!(bytes[4], 1);
        assert_eq!(PageHeader::decode(&bytes, PageId(0)).unwrap(), header);

        let mut page = vec![0u8; PAGE_SIZE];
        page[9..17].copy_from_slice(&encode_top_head(ptr(5, 300).into()));
        assert_eq!(
            decode_top_head(&page, PageId(0)).unwrap(),
            NodeRef::At(ptr(5, 300))
        );
    }

    // -------- comparator --------

    #[test]
    fn compare_honours_direction_and_prefix() {
        let schema = KeySchema::new(vec![
            KeyColumn::asc("a", DataType::Int),
            KeyColumn::desc("b", DataType::Int),
        ]);
        let k = |a, b| vec![Value::Int32(a), Value::Int32(b)];

        assert_eq!(schema.compare(&k(1, 5), &k(2, 0)), Ordering::Less);
        assert_eq!(schema.compare(&k(1, 5), &k(1, 9)), Ordering::Greater);
        assert_eq!(schema.compare(&k(1, 5), &[Value::Int32(1)]), Ordering::Equal);
        assert_eq!(
            schema.compare(&[Value::Int64(3)], &[Value::Int32(3)]),
            Ordering::Equal
        );
    }

    #[test]
    fn nulls_sort_first_ascending_last_descending() {
        let asc = int_schema();
        let desc = KeySchema::new(vec![KeyColumn::desc("k", DataType::Int)]);
        let null = [Value::Null];
        let min = [Value::Int32(i32::MIN)];

        assert_eq!(asc.compare(&null, &min), Ordering::Less);
        assert_eq!(desc.compare(&null, &min), Ordering::Greater);
    }

    // -------- predicates --------

    #[test]
    fn like_wildcards() {
        assert!(like_match("apple", "app%"));
        assert!(like_match("apple", "%ple"));
        assert!(like_match("apple", "a_p%e"));
        assert!(like_match("", "%"));
        assert!(!like_match("apple", "app"));
        assert!(!like_match("apple", "_pple_"));
        assert!(like_match("mississippi", "%iss%ppi"));
    }

    #[test]
    fn like_prefix_and_successor() {
        assert_eq!(like_prefix("ab%"), Some(("ab".into(), true)));
        assert_eq!(like_prefix("ab%c"), Some(("ab".into(), false)));
        assert_eq!(like_prefix("ab"), Some(("ab".into(), false)));
        assert_eq!(like_prefix("%ab"), None);

        assert_eq!(prefix_successor("ab").as_deref(), Some("ac"));
        assert_eq!(prefix_successor(""), None);
    }

    #[test]
    fn literal_on_the_left_is_flipped() {
        let pred = Predicate::new(
            Operand::Literal(Value::Int32(5)),
            CompareOp::Lt,
            Operand::Column(0),
        );
        let (col, op, lit) = pred.column_literal().unwrap();
        assert_eq!((col, op, lit), (0, CompareOp::Gt, &Value::Int32(5)));

        assert!(pred.passes(&[Value::Int32(6)]).unwrap());
        assert!(!pred.passes(&[Value::Int32(5)]).unwrap());
        assert!(!pred.passes(&[Value::Null]).unwrap());
    }

    #[test]
    fn out_of_range_column_fails_evaluation() {
        let pred = Predicate::column(3, CompareOp::Eq, Value::Int32(1));
        assert!(matches!(
            pred.passes(&[Value::Int32(1)]),
            Err(IndexError::InvalidScan(_))
        ));
    }

    // -------- plan decomposition --------

    fn eq(col: usize, v: i32) -> Predicate {
        Predicate::column(col, CompareOp::Eq, Value::Int32(v))
    }

    #[test]
    fn leading_equality_pins_start_and_stop() {
        let plan = ScanPlan::build(&int_schema(), Some(eq(0, 5)), vec![]).unwrap();

        assert_eq!(plan.start, StartBound::AtOrAfter(vec![Value::Int32(5)]));
        assert_eq!(plan.stops, vec![StopCondition::NotEqual(vec![Value::Int32(5)])]);
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn composite_equality_consumes_column_prefix() {
        let schema = KeySchema::new(vec![
            KeyColumn::asc("a", DataType::Int),
            KeyColumn::asc("b", DataType::Int),
            KeyColumn::asc("c", DataType::Int),
        ]);
        let gt = Predicate::column(2, CompareOp::Gt, Value::Int32(0));
        let plan = ScanPlan::build(&schema, Some(eq(0, 5)), vec![gt.clone(), eq(1, 7)]).unwrap();

        let key = vec![Value::Int32(5), Value::Int32(7)];
        assert_eq!(plan.start, StartBound::AtOrAfter(key.clone()));
        assert_eq!(plan.stops, vec![StopCondition::NotEqual(key)]);
        assert_eq!(plan.filters, vec![gt]);
    }

    #[test]
    fn gap_in_equalities_stops_the_composite_key() {
        let schema = KeySchema::new(vec![
            KeyColumn::asc("a", DataType::Int),
            KeyColumn::asc("b", DataType::Int),
            KeyColumn::asc("c", DataType::Int),
        ]);
        let plan = ScanPlan::build(&schema, Some(eq(0, 1)), vec![eq(2, 3)]).unwrap();

        assert_eq!(plan.start, StartBound::AtOrAfter(vec![Value::Int32(1)]));
        assert_eq!(plan.filters, vec![eq(2, 3)]);
    }

    #[test]
    fn range_bounds_follow_column_direction() {
        let asc = int_schema();
        let desc = KeySchema::new(vec![KeyColumn::desc("k", DataType::Int)]);
        let v = || Value::Int32(5);
        let pred = |op| Predicate::column(0, op, Value::Int32(5));

        let cases = [
            (&asc, CompareOp::Gt, StartBound::After(vec![v()]), None),
            (&asc, CompareOp::GtEq, StartBound::AtOrAfter(vec![v()]), None),
            (&asc, CompareOp::Lt, StartBound::First, Some(CompareOp::GtEq)),
            (&asc, CompareOp::LtEq, StartBound::First, Some(CompareOp::Gt)),
            (&desc, CompareOp::Lt, StartBound::After(vec![v()]), None),
            (&desc, CompareOp::LtEq, StartBound::AtOrAfter(vec![v()]), None),
            (&desc, CompareOp::Gt, StartBound::First, Some(CompareOp::LtEq)),
            (&desc, CompareOp::GtEq, StartBound::First, Some(CompareOp::Lt)),
        ];

        for (schema, op, start, stop) in cases {
            let plan = ScanPlan::build(schema, Some(pred(op)), vec![]).unwrap();
            assert_eq!(plan.start, start, "{op}");
            let expected: Vec<StopCondition> = stop
                .map(|op| StopCondition::Compare {
                    column: 0,
                    op,
                    value: v(),
                })
                .into_iter()
                .collect();
            assert_eq!(plan.stops, expected, "{op}");
            // kept so NULL keys are rejected
            assert_eq!(plan.filters, vec![pred(op)]);
        }
    }

    #[test]
    fn like_prefix_positions_by_direction() {
        let col = |order| {
            KeySchema::new(vec![KeyColumn::new(
                "s",
                DataType::Varchar { max_len: None },
                order,
            )])
        };
        let like = |p: &str| Predicate::column(0, CompareOp::Like, Value::String(p.into()));

        let asc = ScanPlan::build(&col(crate::index::key::SortOrder::Asc), Some(like("ab%")), vec![])
            .unwrap();
        assert_eq!(asc.start, StartBound::AtOrAfter(vec![Value::String("ab".into())]));
        assert!(asc.filters.is_empty());

        let desc = ScanPlan::build(
            &col(crate::index::key::SortOrder::Desc),
            Some(like("ab%d")),
            vec![],
        )
        .unwrap();
        assert_eq!(desc.start, StartBound::After(vec![Value::String("ac".into())]));
        assert_eq!(desc.filters, vec![like("ab%d")]);
        assert_eq!(
            desc.stops,
            vec![StopCondition::LeavesPrefix {
                column: 0,
                prefix: "ab".into()
            }]
        );
    }

    #[test]
    fn non_positioning_predicates_become_filters() {
        let schema = KeySchema::new(vec![
            KeyColumn::asc("a", DataType::Int),
            KeyColumn::asc("b", DataType::Int),
        ]);

        for leading in [
            Predicate::column(0, CompareOp::NotEq, Value::Int32(1)),
            Predicate::column(0, CompareOp::Eq, Value::Null),
            Predicate::column(1, CompareOp::Eq, Value::Int32(1)),
            Predicate::new(Operand::Column(0), CompareOp::Lt, Operand::Column(1)),
        ] {
            let plan = ScanPlan::build(&schema, Some(leading.clone()), vec![]).unwrap();
            assert_eq!(plan.start, StartBound::First);
            assert!(plan.stops.is_empty());
            assert_eq!(plan.filters, vec![leading]);
        }
    }

    #[test]
    fn predicate_on_missing_column_is_rejected() {
        let err = ScanPlan::build(&int_schema(), Some(eq(1, 0)), vec![]).unwrap_err();
        assert!(matches!(err, IndexError::InvalidScan(_)));
    }

    #[test]
    fn stop_conditions_fire_on_the_first_key_past_the_range() {
        let schema = int_schema();
        let plan = ScanPlan::build(
            &schema,
            Some(Predicate::column(0, CompareOp::Lt, Value::Int32(5))),
            vec![],
        )
        .unwrap();

        assert!(!plan.should_stop(&schema, &[Value::Int32(4)]));
        assert!(plan.should_stop(&schema, &[Value::Int32(5)]));
        assert!(!plan.accepts(&[Value::Null]).unwrap());
    }

    // -------- promotion coin --------

    #[test]
    fn promotion_height_is_reproducible_and_geometric() {
        let mut a = StdRng::seed_from_u64(11);
        let mut b = StdRng::seed_from_u64(11);
        let first: Vec<usize> = (0..50).map(|_| promotion_height(&mut a, 0.5)).collect();
        let second: Vec<usize> = (0..50).map(|_| promotion_height(&mut b, 0.5)).collect();
        assert_eq!(first, second);

        let mut rng = StdRng::seed_from_u64(3);
        let n = 20_000;
        let total: usize = (0..n).map(|_| promotion_height(&mut rng, 0.25)).sum();
        // mean of the geometric distribution is p / (1 - p) = 1/3
        let mean = total as f64 / n as f64;
        assert!((mean - 1.0 / 3.0).abs() < 0.05, "mean {mean}");
    }
}
