use stmerge_core::{AstLanguage, MergeConfig, three_way_merge_source};

fn main() -> anyhow::Result<()> {
    let base = r#"
export class Greeter {
  greet(name: string) {
    return "Hello " + name;
  }
  farewell(name: string) {
    return "Bye " + name;
  }
}
"#;

    // reorders the members and adds one
    let a = r#"
export class Greeter {
  farewell(name: string) {
    return "Bye " + name;
  }
  greet(name: string) {
    return "Hello " + name;
  }
  shout(name: string) {
    return name.toUpperCase();
  }
}
"#;

    // edits one method body
    let b = r#"
export class Greeter {
  greet(name: string) {
    return "Hello, " + name + "!";
  }
  farewell(name: string) {
    return "Bye " + name;
  }
}
"#;

    let res = three_way_merge_source(a, base, b, AstLanguage::TypeScript, &MergeConfig::default())?;
    println!("--- MERGED CODE ---\n{}", res.merged_code);
    if res.conflicts == 0 {
        println!("(no conflicts)");
    } else {
        println!("--- CONFLICTS ---");
        println!("{}", serde_json::to_string_pretty(&res.differences)?);
    }
    Ok(())
}
