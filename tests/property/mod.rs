// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Ingestion properties checked with proptest over generated device output.

mod ingest_convergence;
