//! # CLI Module
//!
//! The `brrtmvc` binary: quick checks of the files an application boots from.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Load a routes file and print every route in registration order, or
//! resolve a single request against it:
//!
//! ```bash
//! brrtmvc routes --file config/routes.yaml
//! brrtmvc routes --file config/routes.yaml --method get --path /posts/hello
//! ```
//!
//! Unsupported methods in the file fail the load, the same way they fail at
//! startup.
//!
//! ### `templates`
//!
//! Compile every template under a views directory and print the names
//! handlers use to refer to them:
//!
//! ```bash
//! brrtmvc templates --dir views
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,no_run
//! use brrtmvc::cli::{run, Cli};
//! use clap::Parser;
//!
//! let cli = Cli::parse_from(["brrtmvc", "routes", "--file", "routes.yaml"]);
//! run(&cli, &mut std::io::stdout()).unwrap();
//! ```

mod commands;

pub use commands::{run, run_cli, Cli, Commands};
