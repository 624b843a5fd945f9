// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging initialization for the matching service
//!
//! # Configuration
//!
//! - `RUST_LOG`: log level filter (default: `info`), e.g.
//!   `RUST_LOG=ccq_matching=debug` or `RUST_LOG=engine=debug,scheduler=info`
//!   since every engine log line carries an explicit target
//! - `LOG_DIR`: root directory for log files (default: `{workspace}/logs`);
//!   files go to `{LOG_DIR}/matching/`
//! - `LOG_TO_CONSOLE`: also log to stderr when `true`, `1` or `yes`
//!
//! # Log File Format
//!
//! One file per UTC day named `matching.{date}.log`, rotated by
//! `tracing_appender`. Lines carry an RFC 3339 UTC timestamp, thread
//! id, level, target and message, without ANSI colors.

use std::{
	env,
	path::{Path, PathBuf},
	sync::OnceLock,
};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::{
	non_blocking,
	rolling::{self, Rotation},
};
use tracing_subscriber::{
	EnvFilter, fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt,
};

use crate::config::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, LOG_COMPONENT_NAME};

// Keeps the non-blocking writer flushing until process exit
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

/// Directory holding the workspace `Cargo.toml`, or the current directory
fn find_workspace_root() -> PathBuf {
	let start = env::var("CARGO_MANIFEST_DIR")
		.map(PathBuf::from)
		.or_else(|_| env::current_dir())
		.unwrap_or_else(|_| PathBuf::from("."));

	let workspace = start
		.ancestors()
		.find(|dir| {
			std::fs::read_to_string(dir.join("Cargo.toml"))
				.map(|content| content.contains("[workspace]"))
				.unwrap_or(false)
		})
		.map(Path::to_path_buf);
	workspace.unwrap_or(start)
}

fn log_dir() -> PathBuf {
	let root = env::var("LOG_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|_| find_workspace_root().join("logs"));
	root.join(LOG_COMPONENT_NAME)
}

fn console_enabled() -> bool {
	env::var("LOG_TO_CONSOLE")
		.map(|v| matches!(v.as_str(), "true" | "1" | "yes"))
		.unwrap_or(DEFAULT_LOG_TO_CONSOLE)
}

/// Initialize logging with daily-rolling file output and optional stderr output
pub fn init_logging() -> Result<()> {
	dotenv::dotenv().ok();

	let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
	let log_dir = log_dir();
	std::fs::create_dir_all(&log_dir)
		.with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

	let file_appender = rolling::RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME)
		.filename_suffix("log")
		.build(&log_dir)
		.with_context(|| {
			format!(
				"Failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;
	let (file_writer, guard) = non_blocking(file_appender);
	LOG_GUARD.set(guard).ok();

	let log_to_console = console_enabled();
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

	let file_layer = fmt::layer()
		.with_writer(file_writer)
		.with_timer(fmt::time::UtcTime::rfc_3339())
		.with_thread_ids(true)
		.with_target(true)
		.with_ansi(false);
	let console_layer = log_to_console.then(|| {
		fmt::layer()
			.with_writer(std::io::stderr)
			.with_timer(fmt::time::UtcTime::rfc_3339())
			.with_thread_ids(true)
			.with_target(true)
			.with_ansi(true)
	});

	Registry::default()
		.with(filter)
		.with(file_layer)
		.with(console_layer)
		.try_init()
		.context("Failed to install tracing subscriber")?;

	info!(target: "server", "Log level: {}", log_level);
	info!(target: "server", "Log directory: {}", log_dir.display());
	if log_to_console {
		info!(target: "server", "Console output: enabled");
	}

	Ok(())
}
