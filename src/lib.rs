//! # Document QA
//!
//! A retrieval-augmented question-answering assistant for local documents.
//!
//! Document QA ingests PDFs, plain-text files, and web pages, splits their
//! text into overlapping chunks, embeds the chunks, and stores them in a
//! persistent vector index. Questions are answered by retrieving the most
//! similar chunks and asking a language model to synthesize an answer
//! grounded in them, with the contributing sources cited.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────┐
//! │  Extractors │──▶│   Pipeline    │──▶│   index.json   │
//! │ PDF/Text/Web│   │ Chunk+Embed  │   │ SQLite metadata│
//! └─────────────┘   └──────────────┘   └───────┬────────┘
//!                                              │
//!                                              ▼
//!                                     ┌─────────────────┐
//!                                     │  Retrieve + LLM │
//!                                     │  (ask / chat)   │
//!                                     └─────────────────┘
//! ```
//!
//! ## Getting started
//!
//! ```bash
//! docqa init                          # create database
//! docqa ingest ./docs policy.pdf     # ingest files and directories
//! docqa ingest --link https://example.com/handbook
//! docqa ask "How long do refunds take?"
//! docqa chat                          # interactive loop
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Config file loading and validation |
//! | [`models`] | Plain data types shared across the pipeline |
//! | [`context`] | Shared runtime handles (`AppContext`) |
//! | [`extract`] | PDF, plain-text, and web-page text extraction |
//! | [`chunker`] | Overlapping text chunking |
//! | [`embedding`] | Embedding backends and vector math |
//! | [`completion`] | Chat completion calls |
//! | [`index`] | Persistent brute-force vector index |
//! | [`store`] | SQLite source metadata |
//! | [`ingest`] | Ingestion orchestrator |
//! | [`query`] | Retrieval and answer synthesis |

pub mod chunker;
pub mod completion;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod manage;
pub mod models;
pub mod progress;
pub mod query;
pub mod stats;
pub mod store;
