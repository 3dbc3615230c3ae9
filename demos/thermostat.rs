//! Feeds a stream of temperature readings through a rule book and prints what
//! fired. Run with `RUST_LOG=rulestreak=debug` to see every evaluation.

use rulestreak::{ActionRegistry, Context, Expr, ExprEvaluator, RuleBook, RuleProcessor, Value};
use tracing_subscriber::EnvFilter;

const RULES: &str = r#"
rule overheating (history 5):
    sensor.temp > 80 AND NOT sensor.muted
    on true:
        page_oncall after 3 with channel = "ops"
        fan_on
    on false:
        fan_off after 2

rule freezing:
    sensor.temp < 5
    on true:
        heater_on after 2
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let book = RuleBook::from_dsl(RULES)?;
    println!("{book}");

    let registry = ActionRegistry::<Context, Expr>::new()
        .register("page_oncall", |ctx, rule, def| {
            let channel = def.param("channel").map(ToString::to_string).unwrap_or_default();
            println!("  paging {channel}: '{}' at {}", rule.name(), temp(ctx));
            Ok(())
        })
        .register("fan_on", |ctx, _, _| {
            ctx.insert("fan", true);
            Ok(())
        })
        .register("fan_off", |ctx, _, _| {
            ctx.insert("fan", false);
            Ok(())
        })
        .register("heater_on", |_, _, _| Err("heater relay not connected".into()));

    let processor = RuleProcessor::new(ExprEvaluator::default(), registry);
    let mut ctx = Context::new().set("sensor.muted", false);

    for reading in [72, 85, 88, 91, 93, 79, 60, 4, 3, 2] {
        ctx.insert("sensor.temp", i64::from(reading));
        println!("reading {reading}");
        for report in processor.run_all(&mut ctx, &book)? {
            if !report.fired().is_empty() || !report.failed().is_empty() {
                println!("  {report}");
            }
        }
        println!("  fan: {}", ctx.get("fan").map_or("unset".to_owned(), ToString::to_string));
    }
    Ok(())
}

fn temp(ctx: &Context) -> Value {
    ctx.get("sensor.temp").cloned().unwrap_or(Value::Int(0))
}
