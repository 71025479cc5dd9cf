pub mod submission;
pub mod test_outcome_collection;
pub mod test_setup;

pub use submission::Entity as Submission;
pub use test_outcome_collection::Entity as TestOutcomeCollection;
pub use test_setup::Entity as TestSetup;
