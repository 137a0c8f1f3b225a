//! Host integration tests for the instrument core

#[cfg(test)]
mod actor_tests;
#[cfg(test)]
mod preset_tables;
#[cfg(test)]
mod protocol_properties;
#[cfg(test)]
mod scenario_tests;
