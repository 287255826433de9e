use anyhow::Result;
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

fn catctl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_catctl"))
}

/// Test that the CLI can be launched with basic info command
#[test]
fn test_cli_info_command() -> Result<()> {
    let output = catctl().args(["--workers", "3", "info"]).output()?;
    assert!(output.status.success(), "CLI info command failed");

    let output_str = String::from_utf8(output.stdout)?;
    assert!(output_str.contains("catalogd cluster information:"), "Expected info output not found");
    assert!(output_str.contains("Worker nodes: 3"), "Worker count not found");
    assert!(output_str.contains("Roles: alice, bob"), "Role list not found");
    Ok(())
}

#[test]
fn test_cli_help() -> Result<()> {
    let output = catctl().arg("--help").output()?;
    assert!(output.status.success());
    let output_str = String::from_utf8(output.stdout)?;
    assert!(output_str.contains("explain"));
    assert!(output_str.contains("--dispatch-timeout-ms"));
    Ok(())
}

/// Test running a script, including a failing line
#[test]
fn test_cli_run_script() -> Result<()> {
    let mut script = NamedTempFile::new()?;
    writeln!(script, "# comparison operators")?;
    writeln!(script, "define < leftarg=int4 rightarg=int4 procedure=int4lt commutator=>")?;
    writeln!(script, "remove ~ int4 int4")?;
    writeln!(script, "show 2")?;
    script.flush()?;

    let output = catctl()
        .args(["run", &script.path().to_string_lossy()])
        .output()?;
    assert!(output.status.success(), "CLI run command failed");

    let output_str = String::from_utf8(output.stdout)?;
    assert!(output_str.contains("DEFINE OPERATOR 16385"), "{}", output_str);
    assert!(output_str.contains("replicated to 2 worker(s)"), "{}", output_str);
    assert!(output_str.contains("ERROR:  line 3:"), "{}", output_str);
    assert!(output_str.contains("node 2: 2 operator(s)"), "{}", output_str);
    assert!(output_str.contains("shell"), "{}", output_str);
    assert!(output_str.contains("1 command(s) failed"), "{}", output_str);
    Ok(())
}

/// Test that explain prints the frame without running anything
#[test]
fn test_cli_explain() -> Result<()> {
    let output = catctl()
        .args(["explain", "define < leftarg=int4 rightarg=int4 procedure=int4lt"])
        .output()?;
    assert!(output.status.success(), "CLI explain command failed");

    let output_str = String::from_utf8(output.stdout)?;
    assert!(output_str.contains("DefineOperator"), "{}", output_str);
    assert!(output_str.contains("frame: "), "{}", output_str);
    // Frame magic, little-endian
    assert!(output_str.contains("44544143"), "{}", output_str);

    let rejected = catctl().args(["explain", "show"]).output()?;
    assert!(!rejected.status.success());
    Ok(())
}

/// Test the CLI shell functionality with input redirection
#[test]
fn test_cli_shell_interaction() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let mut input_file = NamedTempFile::new()?;
    writeln!(input_file, "define = leftarg=int4 rightarg=int4 procedure=int4eq")?;
    writeln!(input_file, "help")?;
    writeln!(input_file, "exit")?;
    input_file.flush()?;

    let output = catctl()
        .current_dir(temp_dir.path())
        .stdin(Stdio::from(input_file.reopen()?))
        .output()?;
    assert!(output.status.success(), "CLI shell interaction failed");

    let output_str = String::from_utf8(output.stdout)?;
    assert!(output_str.contains("Welcome to catctl"), "Welcome message not found");
    assert!(output_str.contains("DEFINE OPERATOR"), "Command output not found");
    assert!(output_str.contains("Available commands:"), "Help message not found");
    assert!(output_str.contains("Goodbye!"), "Exit message not found");
    Ok(())
}
