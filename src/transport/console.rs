//! Console responder for human operators.
//!
//! Lists pending queries on a terminal, prompts for a selection and an
//! answer, and submits the answer through the HTTP client. Intended for
//! answering an agent that is currently blocked on a query.

use colored::Colorize;
use std::io::{self, Write};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::human_input::PendingQuery;
use crate::transport::client::HumanApiClient;

/// Interactive console loop for answering pending queries
#[derive(Debug)]
pub struct ConsoleResponder {
    client: HumanApiClient,

    /// Whether to use colored output
    colored_output: bool,

    /// Access mutex so concurrent prompts do not interleave on the terminal
    access_mutex: Mutex<()>,
}

impl ConsoleResponder {
    /// Create a new console responder
    pub fn new(client: HumanApiClient) -> Self {
        Self {
            client,
            colored_output: true,
            access_mutex: Mutex::new(()),
        }
    }

    /// Create a responder with colored output disabled
    pub fn without_color(client: HumanApiClient) -> Self {
        Self {
            client,
            colored_output: false,
            access_mutex: Mutex::new(()),
        }
    }

    /// Show pending queries, prompt for one answer, and submit it.
    ///
    /// Returns `true` if an answer was submitted, `false` if there was
    /// nothing to answer.
    pub async fn run_once(&self) -> Result<bool> {
        let _lock = self.access_mutex.lock().await;

        let pending = self.client.pending_queries().await?;
        if pending.is_empty() {
            println!("No pending queries.");
            return Ok(false);
        }

        self.print_pending(&pending);

        print!("Select query to answer (1-{}): ", pending.len());
        io::stdout().flush()?;
        let choice = self.read_line().await?;
        let index: usize = choice
            .parse()
            .map_err(|_| Error::Validation(format!("invalid selection: {}", choice)))?;
        if index < 1 || index > pending.len() {
            return Err(Error::Validation(format!("selection out of range: {}", index)));
        }
        let selected = &pending[index - 1];

        if self.colored_output {
            println!("\n{} {}", "Question:".bold(), selected.question);
        } else {
            println!("\nQuestion: {}", selected.question);
        }
        if let Some(context) = &selected.context {
            println!("Context: {}", context);
        }

        print!("> ");
        io::stdout().flush()?;
        let answer = self.read_line().await?;
        if answer.is_empty() {
            return Err(Error::Validation("answer cannot be empty".to_string()));
        }

        self.client.respond(&selected.query_id, &answer).await?;
        info!("Answered query {}", selected.query_id);
        if self.colored_output {
            println!("{}", "Response recorded.".green());
        } else {
            println!("Response recorded.");
        }

        Ok(true)
    }

    fn print_pending(&self, pending: &[PendingQuery]) {
        if self.colored_output {
            println!("\n{}", "PENDING QUERIES".bold().blue());
        } else {
            println!("\nPENDING QUERIES");
        }
        println!("{}", "-".repeat(50));

        for (i, query) in pending.iter().enumerate() {
            let short_id: String = query.query_id.chars().take(8).collect();
            println!("{}. [{}...] {}", i + 1, short_id, query.question);
        }
        println!();
    }

    /// Read a line from stdin without blocking the runtime
    async fn read_line(&self) -> Result<String> {
        debug!("Reading operator input");
        let mut input = String::new();

        tokio::task::spawn_blocking(move || match io::stdin().read_line(&mut input) {
            Ok(_) => Ok(input),
            Err(e) => Err(Error::Io(e)),
        })
        .await
        .map_err(|e| Error::Internal(format!("input task failed: {}", e)))?
        .map(|s| s.trim().to_string())
    }
}
