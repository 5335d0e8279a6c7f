//! Harvest: Activity Recognition Analysis Library
//!
//! Cleans wearable-sensor training and evaluation tables, explores predictor
//! correlations, compares PCA-preprocessed classifiers on a held-out split and
//! predicts the evaluation table with the best one.

pub mod cli;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod utils;
