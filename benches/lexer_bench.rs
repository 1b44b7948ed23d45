use butter::{Interpreter, parse_str, tokenize};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

// A reasonably complex program for benchmarking
const BENCH_SNIPPET: &str = r#"
// Calculate the nth Fibonacci number
fn fib(int n) => int {
    if n < 2 {
        return n
    }
    return fib(n - 1) + fib(n - 2)
}

/* factorial, the iterative way
   with a block comment */
fn factorial(int n) => int {
    int acc := 1
    while n > 0 {
        acc := acc * n
        n := n - 1
    }
    return acc
}

lambda twice := lambda(lambda f, int x) => int { return f(f(x)) }
string greeting := "string with spaces" + 123 + " " + 45.67
bool check := fib(10) >= 55 and factorial(5) != 0 or false
print greeting
"#;

const FIB_PROGRAM: &str = r#"
fn fib(int n) => int {
    if n < 2 {
        return n
    }
    return fib(n - 1) + fib(n - 2)
}
int result := fib(18)
"#;

fn bench_tokenizer(c: &mut Criterion) {
    let input = BENCH_SNIPPET.repeat(50);
    let mut group = c.benchmark_group("Tokenizer");

    group.bench_with_input(
        BenchmarkId::new("tokenize", "complex_input"), // Label for the benchmark
        &input,
        // `black_box` prevents the compiler from optimizing away the input/work
        |b, input| b.iter(|| tokenize(black_box(input))),
    );

    group.finish();
}

fn bench_interpreter(c: &mut Criterion) {
    let statements = match parse_str(FIB_PROGRAM) {
        Ok(statements) => statements,
        Err(e) => panic!("benchmark program does not parse: {}", e),
    };
    let mut group = c.benchmark_group("Interpreter");

    group.bench_function("fib(18)", |b| {
        b.iter(|| {
            let mut interpreter = Interpreter::with_output(Vec::new());
            interpreter.interpret(black_box(&statements), false)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_tokenizer, bench_interpreter);
criterion_main!(benches);
