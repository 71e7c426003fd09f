//! Shared test harness modules for the siting CLI.

use super::*;

mod helpers;
mod steps;
