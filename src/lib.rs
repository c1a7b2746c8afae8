//! # Transcript Harness
//!
//! A transcript ingestion and semantic retrieval pipeline for video
//! libraries.
//!
//! Transcript Harness turns a queue of pending transcript-fetch jobs into
//! idempotent storage writes, folds the time-stamped transcripts into
//! context-window chunks, and serves semantic retrieval over the resulting
//! vector index.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │ Job queue │──▶│ Fetch+Store  │──▶│ Chunker    │──▶│ SQLite    │
//! │ (SQLite)  │   │ (HTTP APIs)  │   │ max_words  │   │ vectors   │
//! └───────────┘   └──────────────┘   └───────────┘   └────┬─────┘
//!                                                         │
//!                                                         ▼
//!                                                   ┌──────────┐
//!                                                   │   CLI    │
//!                                                   │  (trx)   │
//!                                                   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! trx init                        # create database
//! trx work                        # claim and process one pending job
//! trx ingest dQw4w9WgXcQ          # ingest one media id directly
//! trx reindex                     # rebuild the vector index from storage
//! trx search "ownership rules"    # semantic retrieval
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`media`] | Media reference resolution |
//! | [`transcript`] | Transcript source client |
//! | [`storage`] | Object storage for transcript blobs |
//! | [`chunk`] | Context-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persistent vector index |
//! | [`queue`] | Job queue and materialized outcome rows |
//! | [`worker`] | Ingestion orchestration |
//! | [`search`] | Retrieval read path |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod media;
pub mod migrate;
pub mod models;
pub mod queue;
pub mod search;
pub mod storage;
pub mod transcript;
pub mod worker;
