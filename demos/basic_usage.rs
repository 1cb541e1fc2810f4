//! Basic example of moving users to emeritus in one OWNERS file

use maintainers::yaml::{parse, serialize};
use maintainers::migrate_to_emeritus;

const OWNERS: &str = "\
# See the OWNERS docs at https://go.k8s.io/owners
approvers:
  - alice
  - Bob # on leave
reviewers:
  - bob
  - carol
labels:
  - sig/node
";

fn main() -> anyhow::Result<()> {
    let mut document = parse(OWNERS)?;

    for user in ["bob", "carol"] {
        let outcome = migrate_to_emeritus(&mut document, user);
        println!(
            "{}: removed = {}, promoted to emeritus = {}",
            user, outcome.removed, outcome.promoted
        );
    }

    println!("\n=== Rewritten OWNERS ===");
    print!("{}", serialize(&document, 2)?);

    Ok(())
}
