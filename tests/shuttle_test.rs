#![cfg(feature = "shuttle")]

mod common;

use test_log::test;

#[test]
fn one_reader_one_writer_shuttle_test() {
    shuttle::check_random(common::reader_never_sees_deleted_object, 10_000);
}

#[test]
fn one_reader_one_writer_pct_shuttle_test() {
    shuttle::check_pct(common::reader_never_sees_deleted_object, 1_000, 3);
}
