//! Benchmarks for lexing and incremental re-lexing in paredit-lib.
//!
//! Run with: `cargo bench -p paredit-lib --bench flush`

use divan::{
  Bencher,
  black_box,
};
use paredit_lib::{
  config::IndentConfig,
  indent::get_indent,
  model::LineInputModel,
};

fn main() {
  divan::main();
}

fn make_source(forms: usize) -> String {
  let form = "(defn foo [x]\n  (let [y (inc x)]\n    ;; add them up\n    (str \"sum: \" (+ x y))))\n\n";
  form.repeat(forms)
}

// `LineInputModel::from_text` benchmarks.

mod lex {
  use super::*;

  #[divan::bench(args = [10, 100, 1000])]
  fn from_text(bencher: Bencher, forms: usize) {
    let source = make_source(forms);
    bencher.bench(|| black_box(LineInputModel::from_text(black_box(&source))));
  }
}

// `LineInputModel::flush_changes` benchmarks.

mod flush {
  use super::*;

  const FORMS: usize = 1000;

  #[divan::bench]
  fn single_line_edit(bencher: Bencher) {
    let source = make_source(FORMS);
    bencher
      .with_inputs(|| {
        let mut model = LineInputModel::from_text(&source);
        model.insert_string(1, "x", None, None);
        model
      })
      .bench_local_values(|mut model| {
        model.flush_changes();
        black_box(model)
      });
  }

  /// An unterminated quote at the top flips the state of every line below.
  #[divan::bench]
  fn string_cascade(bencher: Bencher) {
    let source = make_source(FORMS);
    bencher
      .with_inputs(|| {
        let mut model = LineInputModel::from_text(&source);
        model.insert_string(0, "\"", None, None);
        model
      })
      .bench_local_values(|mut model| {
        model.flush_changes();
        black_box(model)
      });
  }
}

// `get_indent` benchmarks.

mod indent {
  use super::*;

  #[divan::bench(args = [10, 1000])]
  fn end_of_document(bencher: Bencher, forms: usize) {
    let mut source = make_source(forms);
    source.push_str("(let [a 1]");
    let model = LineInputModel::from_text(&source);
    let config = IndentConfig::default();
    let offset = model.max_offset();
    bencher.bench(|| get_indent(black_box(&model), black_box(offset), &config));
  }
}
