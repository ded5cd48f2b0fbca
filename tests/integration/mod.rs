//! Integration tests for the studia pipeline, service and CLI wiring

mod config_layers;
mod pipeline_scenarios;
mod schema_contract;
mod study_service;
mod support;
