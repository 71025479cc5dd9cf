pub mod m202610010001_create_test_setups;
pub mod m202610010002_create_submissions;
pub mod m202610010003_create_test_outcome_collections;
