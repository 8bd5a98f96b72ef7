//! Integration tests
//!
//! `router_tests` drive the real router in-process; `api_tests` need a running
//! server and database and are ignored by default.

mod api_tests;
mod router_tests;
