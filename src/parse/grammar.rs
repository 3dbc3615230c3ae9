use winnow::ascii::{dec_int, dec_uint, till_line_ending};
use winnow::combinator::{
    alt, cut_err, delimited, not, opt, preceded, repeat, separated, terminated,
};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::{ActionDefinition, CompareOp, Expr, Value};

use super::parser::ParsedRule;

/// Words that end an action list instead of naming an action.
const RESERVED: &[&str] = &["rule", "on"];

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

// -- Whitespace & comments --------------------------------------------------

pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

// -- Identifiers & keywords -------------------------------------------------

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)
}

/// `kw` as a whole word: `not` must not match the start of `notify`.
fn keyword<'i>(kw: &'static str) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    terminated(kw, not(one_of(is_ident_char)))
}

// -- Values -----------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        match cut_err(any).parse_next(input)? {
            '"' => return Ok(s),
            '\\' => match cut_err(any).parse_next(input)? {
                '"' => s.push('"'),
                '\\' => s.push('\\'),
                'n' => s.push('\n'),
                't' => s.push('\t'),
                other => {
                    s.push('\\');
                    s.push(other);
                }
            },
            c => s.push(c),
        }
    }
}

fn float_literal(input: &mut &str) -> ModalResult<f64> {
    (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        '.',
        take_while(1.., |c: char| c.is_ascii_digit()),
    )
        .take()
        .try_map(str::parse::<f64>)
        .parse_next(input)
}

fn value(input: &mut &str) -> ModalResult<Value> {
    ws.parse_next(input)?;
    alt((
        string_literal.map(Value::String),
        keyword("true").value(Value::Bool(true)),
        keyword("false").value(Value::Bool(false)),
        float_literal.map(Value::Float),
        dec_int::<_, i64, _>.map(Value::Int),
    ))
    .context(expected("value"))
    .parse_next(input)
}

// -- Comparison operators ---------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .parse_next(input)
}

// -- Expressions (precedence: OR < AND < NOT < primary) ---------------------

fn primary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        delimited('(', expr, (ws, cut_err(')'))),
        keyword("true").value(Expr::Const(true)),
        keyword("false").value(Expr::Const(false)),
        comparison_or_truthy,
    ))
    .context(expected("expression"))
    .parse_next(input)
}

fn comparison_or_truthy(input: &mut &str) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?;
    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if let Ok(op) = compare_op.parse_next(input) {
        let val = cut_err(value).parse_next(input)?;
        Ok(Expr::Compare {
            field: name.to_owned(),
            op,
            value: val,
        })
    } else {
        input.reset(&checkpoint);
        Ok(Expr::Truthy(name.to_owned()))
    }
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    if opt(alt((keyword("NOT"), keyword("not"))))
        .parse_next(input)?
        .is_some()
    {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Expr::Not(Box::new(inner)))
    } else {
        primary(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = unary(input)?;
    let rest: Vec<Expr> = repeat(
        0..,
        preceded((ws, alt((keyword("AND"), keyword("and")))), cut_err(unary)),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, Expr::and))
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr(input)?;
    let rest: Vec<Expr> = repeat(
        0..,
        preceded((ws, alt((keyword("OR"), keyword("or")))), cut_err(and_expr)),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, Expr::or))
}

pub(crate) fn expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Actions ----------------------------------------------------------------

fn param(input: &mut &str) -> ModalResult<(String, Value)> {
    ws.parse_next(input)?;
    let key = cut_err(ident)
        .context(expected("parameter name"))
        .parse_next(input)?;
    (ws, cut_err('=')).parse_next(input)?;
    let val = cut_err(value).parse_next(input)?;
    Ok((key.to_owned(), val))
}

fn action_def(input: &mut &str) -> ModalResult<ActionDefinition> {
    ws.parse_next(input)?;
    let name = ident
        .verify(|name: &str| !RESERVED.contains(&name))
        .parse_next(input)?;

    let hits = opt(preceded(
        (ws, keyword("after"), ws),
        cut_err(dec_uint::<_, usize, _>).context(expected("consecutive hit count")),
    ))
    .parse_next(input)?
    .unwrap_or(1);

    let params: Option<Vec<(String, Value)>> = opt(preceded(
        (ws, keyword("with")),
        cut_err(separated(1.., param, (ws, ','))),
    ))
    .parse_next(input)?;

    Ok(params
        .into_iter()
        .flatten()
        .fold(ActionDefinition::new(name, hits), |def, (k, v)| {
            def.with_param(k, v)
        }))
}

fn branch(input: &mut &str) -> ModalResult<(bool, Vec<ActionDefinition>)> {
    (ws, keyword("on"), ws).parse_next(input)?;
    let outcome = cut_err(alt((
        keyword("true").value(true),
        keyword("false").value(false),
    )))
    .context(expected("true or false"))
    .parse_next(input)?;
    (ws, cut_err(':')).parse_next(input)?;
    let actions = repeat(0.., action_def).parse_next(input)?;
    Ok((outcome, actions))
}

// -- Rule definitions -------------------------------------------------------

fn history_annotation(input: &mut &str) -> ModalResult<usize> {
    delimited(
        (ws, '(', ws, keyword("history"), ws),
        cut_err(dec_uint::<_, usize, _>).context(expected("history size")),
        (ws, cut_err(')')),
    )
    .parse_next(input)
}

fn rule_def(input: &mut &str) -> ModalResult<ParsedRule> {
    (ws, keyword("rule"), ws).parse_next(input)?;

    let name = cut_err(ident)
        .context(expected("rule name"))
        .parse_next(input)?;
    let max_history = opt(history_annotation).parse_next(input)?;

    (ws, cut_err(':')).parse_next(input)?;

    let expression = cut_err(expr)
        .context(expected("rule condition"))
        .parse_next(input)?;

    let branches: Vec<(bool, Vec<ActionDefinition>)> = repeat(0.., branch).parse_next(input)?;
    let mut rule = ParsedRule {
        name: name.to_owned(),
        max_history,
        expression,
        true_actions: Vec::new(),
        false_actions: Vec::new(),
    };
    for (outcome, actions) in branches {
        if outcome {
            rule.true_actions.extend(actions);
        } else {
            rule.false_actions.extend(actions);
        }
    }
    Ok(rule)
}

// -- Top-level parser -------------------------------------------------------

pub(crate) fn parse_rules(input: &mut &str) -> ModalResult<Vec<ParsedRule>> {
    let rules = repeat(0.., rule_def).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use crate::parse::{parse, parse_expr};

    use super::*;

    #[test]
    fn parse_minimal_rule() {
        let rules = parse("rule hot:\n    temp > 80").unwrap().rules;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "hot");
        assert_eq!(rules[0].max_history, None);
        assert!(rules[0].true_actions.is_empty());
    }

    #[test]
    fn parse_history_annotation() {
        let rules = parse("rule hot (history 7):\n    temp > 80").unwrap().rules;
        assert_eq!(rules[0].max_history, Some(7));
    }

    #[test]
    fn parse_branches_and_thresholds() {
        let input = "\
rule hot:
    temp > 80
    on true:
        page after 3
        log
    on false:
        clear after 2";
        let rule = &parse(input).unwrap().rules[0];
        let names: Vec<(&str, usize)> = rule
            .true_actions
            .iter()
            .map(|a| (a.name(), a.consecutive_hits()))
            .collect();
        assert_eq!(names, vec![("page", 3), ("log", 1)]);
        assert_eq!(rule.false_actions[0].name(), "clear");
        assert_eq!(rule.false_actions[0].consecutive_hits(), 2);
    }

    #[test]
    fn parse_action_params() {
        let input = r#"rule r:
    x == 1
    on true:
        notify after 2 with channel = "ops", level = 3, ratio = -0.5
        log"#;
        let rule = &parse(input).unwrap().rules[0];
        let notify = &rule.true_actions[0];
        assert_eq!(notify.param("channel"), Some(&Value::from("ops")));
        assert_eq!(notify.param("level"), Some(&Value::Int(3)));
        assert_eq!(notify.param("ratio"), Some(&Value::Float(-0.5)));
        assert_eq!(rule.true_actions[1].name(), "log");
    }

    #[test]
    fn repeated_branches_accumulate() {
        let input = "\
rule r:
    x
    on true:
        a
    on false:
        b
    on true:
        c";
        let rule = &parse(input).unwrap().rules[0];
        let names: Vec<&str> = rule.true_actions.iter().map(ActionDefinition::name).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(rule.false_actions.len(), 1);
    }

    #[test]
    fn actions_stop_at_next_rule() {
        let input = "\
rule a:
    x
    on true:
        one
rule b:
    y
    on false:
        two";
        let rules = parse(input).unwrap().rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].true_actions.len(), 1);
        assert_eq!(rules[1].name, "b");
        assert_eq!(rules[1].false_actions[0].name(), "two");
    }

    #[test]
    fn bare_field_is_truthy() {
        assert_eq!(parse_expr("sensor.muted").unwrap(), Expr::Truthy("sensor.muted".into()));
    }

    #[test]
    fn keywords_need_word_boundary() {
        // `notify` is a field, not `NOT ify`; `origin` is not `or igin`.
        assert_eq!(parse_expr("notify").unwrap(), Expr::Truthy("notify".into()));
        match parse_expr("a AND origin").unwrap() {
            Expr::And(_, right) => assert_eq!(*right, Expr::Truthy("origin".into())),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn precedence_and_before_or() {
        match parse_expr("a OR b AND c").unwrap() {
            Expr::Or(left, right) => {
                assert_eq!(*left, Expr::Truthy("a".into()));
                assert!(matches!(*right, Expr::And(_, _)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parenthesized_grouping() {
        assert!(matches!(parse_expr("(a or b) and c").unwrap(), Expr::And(_, _)));
    }

    #[test]
    fn constants_and_not() {
        assert_eq!(parse_expr("true").unwrap(), Expr::Const(true));
        assert_eq!(parse_expr("NOT false").unwrap(), !Expr::Const(false));
    }

    #[test]
    fn all_comparison_ops() {
        let ops = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Neq),
            (">", CompareOp::Gt),
            (">=", CompareOp::Gte),
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Lte),
        ];
        for (sym, expected_op) in ops {
            match parse_expr(&format!("x {sym} 1")).unwrap() {
                Expr::Compare { op, .. } => assert_eq!(op, expected_op, "failed for {sym}"),
                other => panic!("expected Compare for {sym}, got {other:?}"),
            }
        }
    }

    #[test]
    fn all_value_types() {
        let cases = [
            ("42", Value::Int(42)),
            ("-7", Value::Int(-7)),
            ("2.5", Value::Float(2.5)),
            ("true", Value::Bool(true)),
            (r#""a\"b""#, Value::String("a\"b".into())),
        ];
        for (literal, expected) in cases {
            match parse_expr(&format!("x == {literal}")).unwrap() {
                Expr::Compare { value, .. } => assert_eq!(value, expected, "failed for {literal}"),
                other => panic!("expected Compare for {literal}, got {other:?}"),
            }
        }
    }

    #[test]
    fn comments_ignored() {
        let input = "\
# header
rule r: # trailing
    x == 1 # why
    on true: # branch
        a # action";
        let rules = parse(input).unwrap().rules;
        assert_eq!(rules[0].true_actions.len(), 1);
    }

    #[test]
    fn reserved_name_cannot_be_action() {
        assert!(parse("rule r:\n    x\n    on true:\n        on").is_err());
    }

    #[test]
    fn missing_threshold_after_keyword_is_error() {
        assert!(parse("rule r:\n    x\n    on true:\n        page after").is_err());
    }

    #[test]
    fn missing_condition_is_error() {
        assert!(parse("rule r:").is_err());
    }

    #[test]
    fn trailing_garbage_is_error() {
        assert!(parse("rule r:\n    x == 1\n}").is_err());
    }
}
