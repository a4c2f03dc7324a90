use skipdex::{DataType, KeyColumn, KeySchema, Rid, Value};

#[allow(dead_code)]
pub fn int_schema() -> KeySchema {
    KeySchema::new(vec![KeyColumn::asc("id", DataType::Int)])
}

#[allow(dead_code)]
pub fn desc_int_schema() -> KeySchema {
    KeySchema::new(vec![KeyColumn::desc("id", DataType::Int)])
}

#[allow(dead_code)]
pub fn pair_schema() -> KeySchema {
    KeySchema::new(vec![
        KeyColumn::asc("a", DataType::Int),
        KeyColumn::asc("b", DataType::Int),
    ])
}

#[allow(dead_code)]
pub fn name_schema() -> KeySchema {
    KeySchema::new(vec![KeyColumn::asc(
        "name",
        DataType::Varchar { max_len: None },
    )])
}

#[allow(dead_code)]
pub fn int(v: i32) -> Vec<Value> {
    vec![Value::Int32(v)]
}

#[allow(dead_code)]
pub fn pair(a: i32, b: i32) -> Vec<Value> {
    vec![Value::Int32(a), Value::Int32(b)]
}

#[allow(dead_code)]
pub fn text(s: &str) -> Vec<Value> {
    vec![Value::String(s.to_string())]
}

/// Distinct row id per `n`.
#[allow(dead_code)]
pub fn rid(n: i32) -> Rid {
    Rid::new(0, 0, n / 100, n % 100)
}
