use stmerge_core::{AstLanguage, parse_source};

fn main() -> anyhow::Result<()> {
    let code = r#"
        import { log } from './util';
        export function updateUser(name: string) {
            return "Hello, " + name;
        }
        class User { constructor(public id: string) {} }
    "#;

    let tree = parse_source(code, AstLanguage::TypeScript)?;
    let json = serde_json::to_string_pretty(&tree)?;
    println!("{json}");
    Ok(())
}
