//! Integration tests for the capability traits in cowval-common.

use cowval_common::{Op, Operation, Value};

/// A value whose ops borrow an unsized payload.
#[derive(Debug, Clone, Default)]
struct Words(Vec<String>);

struct WordOp(String);

impl Operation for WordOp {
    type Context = str;

    fn kind(&self) -> &str {
        "word"
    }

    fn context(&self) -> &str {
        &self.0
    }
}

impl Value for Words {
    type Op = WordOp;
    type Error = std::convert::Infallible;

    fn copy(&self) -> Self {
        self.clone()
    }

    fn apply(&mut self, ops: Vec<WordOp>) -> Result<(), Self::Error> {
        self.0.extend(ops.iter().map(|op| op.context().to_uppercase()));
        Ok(())
    }
}

#[test]
fn test_unsized_context_operation() {
    let mut words = Words::default();
    words
        .apply(vec![WordOp("alpha".into()), WordOp("beta".into())])
        .unwrap();
    assert_eq!(words.0, vec!["ALPHA", "BETA"]);
}

/// Integer list that rejects negative numbers but keeps applying the rest.
#[derive(Debug, Clone, Default)]
struct Naturals(Vec<i64>);

#[derive(thiserror::Error, Debug)]
#[error("negative value {0}")]
struct Negative(i64);

impl Value for Naturals {
    type Op = Op<i64>;
    type Error = Negative;

    fn copy(&self) -> Self {
        self.clone()
    }

    fn apply(&mut self, ops: Vec<Op<i64>>) -> Result<(), Negative> {
        let mut first_error = None;
        for op in ops {
            let value = op.into_context();
            if value < 0 {
                first_error.get_or_insert(Negative(value));
            } else {
                self.0.push(value);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[test]
fn test_op_kind_is_preserved() {
    let ops: Vec<Op<i64>> = (1..=3).map(|v| Op::new("push", v)).collect();
    assert!(ops.iter().all(|op| op.kind() == "push"));
    assert_eq!(
        ops.iter().map(|op| *op.context()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn test_partial_apply_keeps_earlier_mutations() {
    let mut list = Naturals(vec![10]);
    let ops = vec![Op::new("push", 11), Op::new("push", -1), Op::new("push", 12)];
    let err = list.apply(ops).unwrap_err();
    assert_eq!(err.to_string(), "negative value -1");
    assert_eq!(list.0, vec![10, 11, 12]);
}

#[test]
fn test_copy_does_not_alias() {
    let original = Naturals(vec![1, 2, 3]);
    let mut copy = original.copy();
    copy.0.clear();
    assert_eq!(original.0, vec![1, 2, 3]);
}
