//! Integration tests for the batch ad generator


mod aggregation;
mod checkpoint_resume;
mod dispatcher_scenarios;
mod provider_selection;
