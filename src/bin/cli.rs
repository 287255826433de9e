use std::path::PathBuf;
use std::time::Duration;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use catalogd::catalog::bootstrap::BOOTSTRAP_SUPERUSER;
use catalogd::catalog::{Catalog, ObjectAddress, OperatorRow, Role};
use catalogd::cluster::{ClusterConfig, DispatchEnvelope, DispatchOutcome, LocalCluster, PendingCommand};
use catalogd::command::{
    parse_script_line, CatalogStatement, OperatorCommand, PipelineMode, ScriptLine, SequentialOidGenerator, Session,
};
use catalogd::common::types::{oid_is_valid, NodeId, COORDINATOR_NODE_ID};

const HISTORY_FILE: &str = ".catctl_history";

/// Oid of the first role created with --roles
const FIRST_ROLE_OID: u32 = 20000;

#[derive(Parser)]
#[command(author, version, about = "catctl - run operator catalog commands on an in-process cluster")]
struct Cli {
    /// Number of worker nodes
    #[arg(short, long, default_value_t = 2)]
    workers: usize,

    /// Dispatch timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    dispatch_timeout_ms: u64,

    /// Roles to create on every node (comma separated)
    #[arg(long = "roles", value_delimiter = ',', default_value = "alice,bob")]
    roles: Vec<String>,

    /// Command to execute
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive shell
    Shell,

    /// Execute a file of commands, one per line
    Run {
        /// Script file path
        script: PathBuf,
    },

    /// Show the dispatch frame a command would produce, without running it
    Explain {
        /// Command line, e.g. "define < leftarg=int4 rightarg=int4 procedure=int4lt"
        command: String,
    },

    /// Show cluster information
    Info,
}

/// A cluster plus the session commands run as
struct Console {
    cluster: LocalCluster,
    session: Session,
}

impl Console {
    fn new(cli: &Cli) -> Result<Self> {
        let config = ClusterConfig {
            worker_count: cli.workers,
            dispatch_timeout: Duration::from_millis(cli.dispatch_timeout_ms),
            ..ClusterConfig::default()
        };
        let roles = cli.roles.clone();
        let cluster = LocalCluster::builder(config)
            .setup(move |_, catalog| create_roles(catalog, &roles))
            .build()
            .map_err(|e| anyhow!("failed to start cluster: {}", e))?;
        Ok(Console {
            cluster,
            session: Session::new(BOOTSTRAP_SUPERUSER),
        })
    }

    fn role_name(&self) -> String {
        self.coordinator_catalog()
            .role(self.session.user)
            .map(|r| r.name().to_string())
            .unwrap_or_else(|| self.session.user.to_string())
    }

    fn coordinator_catalog(&self) -> &Catalog {
        self.cluster.coordinator().catalog()
    }

    /// Execute one script line and return what it prints
    fn execute_line(&mut self, line: &str) -> Result<Vec<String>> {
        let parsed = parse_script_line(line)?;
        let output = match parsed {
            ScriptLine::Empty => Vec::new(),
            ScriptLine::Statement(statement) => {
                let result = self.cluster.execute(&self.session, &statement)?;
                render_outcome(&result)
            }
            ScriptLine::SetRole(name) => {
                let role = self
                    .coordinator_catalog()
                    .role_by_name(&name)
                    .ok_or_else(|| anyhow!("role \"{}\" does not exist", name))?;
                self.session.user = role.oid();
                vec![format!("SET ROLE {}", name)]
            }
            ScriptLine::SetSearchPath(path) => {
                self.session.search_path = path;
                vec![format!("SET search_path = {}", self.session.search_path.join(", "))]
            }
            ScriptLine::Show(node) => {
                let node = node.unwrap_or(COORDINATOR_NODE_ID);
                let catalog = self
                    .cluster
                    .catalog(node)
                    .ok_or_else(|| anyhow!("no node {}", node))?;
                render_operators(node, catalog)
            }
        };
        Ok(output)
    }
}

fn create_roles(catalog: &Catalog, roles: &[String]) -> catalogd::catalog::CatalogResult<()> {
    for (i, name) in roles.iter().enumerate() {
        catalog.create_role(Role::new(FIRST_ROLE_OID + i as u32, name.as_str(), false))?;
    }
    Ok(())
}

fn render_outcome(result: &DispatchOutcome) -> Vec<String> {
    let mut lines: Vec<String> = result.outcome.notices.iter().map(|n| n.to_string()).collect();
    let mut status = result.outcome.status.to_string();
    if oid_is_valid(result.outcome.object()) {
        status.push_str(&format!(" {}", result.outcome.object()));
    }
    lines.push(format!(
        "{} (gxid {}, replicated to {} worker(s))",
        status, result.gxid, result.dispatched_to
    ));
    lines
}

fn link(oid: u32) -> String {
    if oid_is_valid(oid) {
        oid.to_string()
    } else {
        "-".to_string()
    }
}

fn render_operators(node: NodeId, catalog: &Catalog) -> Vec<String> {
    let operators: Vec<OperatorRow> = catalog.operators();
    let mut lines = vec![format!("node {}: {} operator(s)", node, operators.len())];
    for row in operators {
        let owner = catalog
            .role(row.owner())
            .map(|r| r.name().to_string())
            .unwrap_or_else(|| row.owner().to_string());
        lines.push(format!(
            "  {:>6}  {:<32} owner={:<8} com={:<6} neg={:<6} {}",
            row.oid(),
            catalog.describe(&ObjectAddress::operator(row.oid())),
            owner,
            link(row.commutator()),
            link(row.negator()),
            if row.is_shell() { "shell" } else { "complete" }
        ));
    }
    lines
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn run_shell(console: &mut Console) -> Result<()> {
    println!("Welcome to catctl. Type 'help' for assistance or 'exit' to quit.");

    let mut rl = Editor::<(), DefaultHistory>::new()?;
    if let Err(err) = rl.load_history(HISTORY_FILE) {
        if !err.to_string().contains("No such file or directory") {
            println!("Error loading history: {}", err);
        }
    }

    loop {
        let prompt = format!("{}> ", console.role_name());
        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line.to_lowercase().as_str() {
                    "exit" | "quit" => {
                        println!("Goodbye!");
                        break;
                    }
                    "help" => print_help(),
                    _ => match console.execute_line(line) {
                        Ok(output) => print_lines(&output),
                        Err(err) => println!("ERROR:  {}", err),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    if let Err(err) = rl.save_history(HISTORY_FILE) {
        println!("Error saving history: {}", err);
    }
    Ok(())
}

fn run_script(console: &mut Console, script: &PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(script).with_context(|| format!("Failed to read {}", script.display()))?;
    let mut failures = 0;
    for (number, line) in text.lines().enumerate() {
        match console.execute_line(line) {
            Ok(output) => print_lines(&output),
            Err(err) => {
                failures += 1;
                println!("ERROR:  line {}: {}", number + 1, err);
            }
        }
    }
    if failures > 0 {
        println!("{} command(s) failed", failures);
    }
    Ok(())
}

/// Run the command against a scratch single-node catalog and print the
/// frame the coordinator would send
fn explain(cli: &Cli, line: &str) -> Result<()> {
    let statement: CatalogStatement = match parse_script_line(line)? {
        ScriptLine::Statement(statement) => statement,
        _ => bail!("only define, alter-owner and remove can be explained"),
    };
    let roles = cli.roles.clone();
    let cluster = LocalCluster::builder(ClusterConfig::default().with_workers(0))
        .setup(move |_, catalog| create_roles(catalog, &roles))
        .build()
        .map_err(|e| anyhow!("failed to start cluster: {}", e))?;

    let session = Session::new(BOOTSTRAP_SUPERUSER);
    let oids = SequentialOidGenerator::default();
    let mut txn = cluster.coordinator().transactions().begin_transaction();
    let outcome = OperatorCommand::new(&session, PipelineMode::Allocate(&oids)).execute(&mut txn, &statement)?;
    txn.abort()?;

    let envelope = DispatchEnvelope {
        gxid: 0,
        session,
        command: PendingCommand::from_outcome(&statement, &outcome)?,
    };
    let frame = envelope.encode()?;
    println!("{:#?}", envelope.command);
    println!("frame: {} bytes", frame.len());
    println!("{}", hex::encode(&frame));
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!("  define <name> key=value ...                       - Define an operator");
    println!("      keys: leftarg rightarg procedure commutator negator restrict join hashes merges");
    println!("  alter-owner <name> <left|none> <right|none> <role> - Change an operator's owner");
    println!("  remove <name> <left|none> <right|none> [cascade] [if-exists]");
    println!("                                                    - Remove an operator");
    println!("  set role <name>                                   - Run further commands as <name>");
    println!("  set search_path <schema>[,<schema>...]            - Change the search path");
    println!("  show [node]                                       - List the operators of a node");
    println!();
    println!("Other commands:");
    println!("  help                                              - Display this help message");
    println!("  exit                                              - Exit the CLI");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Shell) | None => {
            let mut console = Console::new(&cli).context("Failed to initialize cluster")?;
            run_shell(&mut console)?;
        }
        Some(Commands::Run { script }) => {
            let mut console = Console::new(&cli).context("Failed to initialize cluster")?;
            run_script(&mut console, script)?;
        }
        Some(Commands::Explain { command }) => {
            explain(&cli, command)?;
        }
        Some(Commands::Info) => {
            let console = Console::new(&cli).context("Failed to initialize cluster")?;
            let config = console.cluster.config();
            println!("catalogd cluster information:");
            println!("  Worker nodes: {}", config.worker_count);
            println!("  Dispatch timeout: {:?}", config.dispatch_timeout);
            println!("  Lock timeout: {:?}", config.lock_timeout);
            println!("  Coordinator lock wait: {:?}", config.coordinator_lock_timeout());
            println!("  First normal oid: {}", config.first_normal_oid);
            println!("  Roles: {}", cli.roles.join(", "));
        }
    }

    Ok(())
}
