mod common;

mod gc_tests;
mod reconcile_tests;
mod render_tests;
mod submit_tests;
