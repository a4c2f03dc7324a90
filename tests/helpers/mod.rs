pub mod data;
pub mod harness;

#[allow(dead_code)]
pub fn init_tracing_for_tests() {
    skipdex::diagnostics::init_for_tests();
}
