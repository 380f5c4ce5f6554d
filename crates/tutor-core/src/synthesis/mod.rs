/*!
# Synthesis - Learning Transformations From One Example

Turns a single (before, after) pair into ranked, reusable transformations. The
vocabulary the learner may use comes from an edit grammar file loaded once at
startup.

## Example Usage

```rust
use tutor_core::synthesis::{EditGrammar, ExampleLearner};
use tutor_core::{Parser, PythonParser, ToSource};

let learner = ExampleLearner::new(EditGrammar::default());
let learned = learner.learn_from_source("x = 0", "x = 1").unwrap();

let submission = PythonParser::new().parse("total = 0").unwrap();
for tree in learned[0].invoke(&submission) {
    assert_eq!(tree.to_source(), "total = 1\n");
}
```
*/

pub mod diff;
pub mod grammar;
pub mod learner;
pub mod transformation;

pub use diff::{diff, Edit};
pub use grammar::{Abstraction, EditGrammar, EditOperator, GrammarError};
pub use learner::{ExampleLearner, SynthesisEngine};
pub use transformation::GeneralizedTransformation;
