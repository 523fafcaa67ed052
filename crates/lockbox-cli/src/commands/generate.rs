use lockbox_core::crypto::{generate_password, password_strength, PasswordOptions, StrengthLevel};

use crate::app::AppContext;
use crate::cli::GenerateArgs;

pub fn handle_generate(ctx: &AppContext, args: &GenerateArgs) -> anyhow::Result<()> {
    let options = PasswordOptions {
        uppercase: !args.no_uppercase,
        lowercase: !args.no_lowercase,
        numbers: !args.no_numbers,
        symbols: !args.no_symbols,
        exclude_ambiguous: !args.allow_ambiguous,
    };
    let password = generate_password(args.length, &options)?;
    let score = password_strength(&password);

    if args.json {
        let output = serde_json::json!({
            "password": password.as_str(),
            "length": args.length,
            "strength": score,
            "level": StrengthLevel::from_score(score).to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", password.as_str());
    if !ctx.quiet() {
        eprintln!("Strength: {}/100 ({})", score, StrengthLevel::from_score(score));
    }
    Ok(())
}
