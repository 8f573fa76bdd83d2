mod common;
mod report_log_tests;
mod state_tests;
