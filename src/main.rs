use anyhow::{anyhow, Result};

use catalogd::catalog::{ObjectAddress, Role};
use catalogd::cluster::{ClusterConfig, LocalCluster};
use catalogd::command::{parse_script_line, ScriptLine, Session};

const ALICE: u32 = 20000;

fn main() -> Result<()> {
    // Start a coordinator with two workers; every node knows role alice
    let cluster = LocalCluster::builder(ClusterConfig::default())
        .setup(|_, catalog| catalog.create_role(Role::new(ALICE, "alice", false)))
        .build()
        .map_err(|e| anyhow!("failed to start cluster: {}", e))?;
    let session = Session::new(ALICE);

    // `<` names `>` before it exists, so `>` is reserved as a shell and
    // completed by the second command
    let script = [
        "define < leftarg=int4 rightarg=int4 procedure=int4lt commutator=> negator=>=",
        "define > leftarg=int4 rightarg=int4 procedure=int4gt commutator=< negator=<=",
        "define >= leftarg=int4 rightarg=int4 procedure=int4ge commutator=<= negator=<",
        "define <= leftarg=int4 rightarg=int4 procedure=int4le commutator=>= negator=>",
    ];
    for line in script {
        let ScriptLine::Statement(statement) = parse_script_line(line)? else {
            continue;
        };
        let result = cluster.execute(&session, &statement)?;
        println!(
            "{} -> oid {} (gxid {}, replicated to {} worker(s))",
            line,
            result.outcome.object(),
            result.gxid,
            result.dispatched_to
        );
    }

    for node in cluster.node_ids() {
        let Some(catalog) = cluster.catalog(node) else {
            continue;
        };
        println!("node {}:", node);
        for row in catalog.operators() {
            println!(
                "  {:>6} {} commutator={} negator={}",
                row.oid(),
                catalog.describe(&ObjectAddress::operator(row.oid())),
                row.commutator(),
                row.negator()
            );
        }
    }
    println!("cluster consistent: {}", cluster.is_consistent());

    Ok(())
}
