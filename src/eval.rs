//! The evaluator: a tree walking interpreter over values living in the machine heap. Evaluation is
//! a function of an expression and an environment; the only state it touches besides the heap is
//! the nesting counter that bounds recursion.
//!
//! Errors are values. Internally every step returns an [Outcome] whose `Err` side always carries an
//! ERROR value, so `?` gives the fail-fast propagation of operands, conditions and expansions for
//! free, and [Machine::eval] folds both sides back into a single value.

use crate::builtins::Builtin;
use crate::error::EvalError;
use crate::machine::Machine;
use crate::value::{Address, Kind, Tag, Value};

/// Result of an evaluation step. The `Err` side is always an ERROR value.
type Outcome = Result<Value, Value>;

/// Remaining native stack below which a nested step runs on a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each fresh stack segment.
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Forms recognised by the name of their head symbol, whatever the environment binds it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    If,
    Label,
    Lambda,
    Macro,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 5] = [
        SpecialForm::Quote,
        SpecialForm::If,
        SpecialForm::Label,
        SpecialForm::Lambda,
        SpecialForm::Macro,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::If => "if",
            SpecialForm::Label => "label",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Macro => "macro",
        }
    }

    /// Number of parts following the head.
    pub fn arity(self) -> usize {
        match self {
            SpecialForm::Quote => 1,
            SpecialForm::If | SpecialForm::Label => 3,
            SpecialForm::Lambda | SpecialForm::Macro => 2,
        }
    }
}

/// Turns an evaluated value into an [Outcome], diverting ERROR values to the `Err` side.
fn fail_fast(value: Value) -> Outcome {
    if value.is_error() {
        Err(value)
    } else {
        Ok(value)
    }
}

impl Machine {
    /// Encodes an evaluation condition as an ERROR value.
    pub(crate) fn raise(&mut self, error: EvalError) -> Value {
        log::debug!("raising error: {error}");
        self.error(&error.to_string())
    }

    /// Evaluates `expr` in `env`.
    pub fn eval(&mut self, expr: Value, env: Value) -> Value {
        match self.evaluate(expr, env) {
            Ok(value) | Err(value) => value,
        }
    }

    fn evaluate(&mut self, expr: Value, env: Value) -> Outcome {
        match expr.kind() {
            Kind::Symbol(_) => fail_fast(self.lookup(expr, env)),
            Kind::Cons(_) => self
                .nested(|machine| machine.eval_form(expr, env))
                .and_then(fail_fast),
            _ => fail_fast(expr),
        }
    }

    /// Runs one nested evaluation step. The nesting counter bounds the recursion, and the native
    /// stack is grown on demand so that the bound is reached on any thread.
    fn nested(&mut self, step: impl FnOnce(&mut Machine) -> Outcome) -> Outcome {
        if self.depth >= self.config.max_depth {
            return Err(self.raise(EvalError::DepthExceeded(self.config.max_depth)));
        }

        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || step(self));
        self.depth -= 1;

        result
    }

    fn special_form(&self, head: Value) -> Option<SpecialForm> {
        if head.get_type() != Tag::Symbol {
            return None;
        }

        SpecialForm::ALL
            .into_iter()
            .find(|form| self.symbol_is(head, form.name().as_bytes()))
    }

    fn eval_form(&mut self, expr: Value, env: Value) -> Outcome {
        let head = self.car(expr);

        let Some(args) = self.list_to_vec(self.cdr(expr)) else {
            let form = self.display(expr).to_string();
            return Err(self.raise(EvalError::ExpectedList(form)));
        };

        if let Some(form) = self.special_form(head) {
            return self.eval_special(form, &args, env);
        }

        let operator = self.evaluate(head, env)?;

        match operator.kind() {
            Kind::Builtin(id) => {
                Builtin::from_id(id).map_err(|err| self.raise(err))?;
                let operands = self.eval_operands(&args, env)?;
                self.call(operator, &operands)
            }
            Kind::Lambda(_) => {
                let operands = self.eval_operands(&args, env)?;
                self.call(operator, &operands)
            }
            Kind::Macro(record) => self.expand_macro(record, &args, env),
            _ => {
                let operator = self.display(operator).to_string();
                Err(self.raise(EvalError::NotCallable(operator)))
            }
        }
    }

    /// Calls a BUILTIN or a LAMBDA on evaluated operands.
    fn call(&mut self, function: Value, operands: &[Value]) -> Outcome {
        match function.kind() {
            Kind::Builtin(id) => {
                let builtin = Builtin::from_id(id).map_err(|err| self.raise(err))?;
                log::trace!("applying builtin {builtin} to {} operands", operands.len());
                self.apply_builtin(builtin, operands)
            }
            Kind::Lambda(record) => self.apply_lambda(record, operands),
            _ => {
                let function = self.display(function).to_string();
                Err(self.raise(EvalError::NotCallable(function)))
            }
        }
    }

    /// Calls `function` with the elements of the list `args` as operands. Macros can't be applied:
    /// their operands are syntax, not values.
    pub(crate) fn apply_to_list(&mut self, function: Value, args: Value) -> Outcome {
        if !matches!(function.kind(), Kind::Builtin(_) | Kind::Lambda(_)) {
            let function = self.display(function).to_string();
            return Err(self.raise(EvalError::ApplyNonFunction(function)));
        }

        let Some(operands) = self.list_to_vec(args) else {
            let args = self.display(args).to_string();
            return Err(self.raise(EvalError::ApplyNonList(args)));
        };

        self.nested(|machine| machine.call(function, &operands))
    }

    /// Evaluates operands left to right, stopping at the first ERROR.
    fn eval_operands(&mut self, args: &[Value], env: Value) -> Result<Vec<Value>, Value> {
        args.iter().map(|arg| self.evaluate(*arg, env)).collect()
    }

    fn eval_special(&mut self, form: SpecialForm, args: &[Value], env: Value) -> Outcome {
        if args.len() != form.arity() {
            let error = EvalError::MalformedForm(form.name(), form.arity(), args.len());
            return Err(self.raise(error));
        }

        log::trace!("special form {}", form.name());

        match form {
            SpecialForm::Quote => Ok(args[0]),
            SpecialForm::If => {
                let condition = self.evaluate(args[0], env)?;
                if condition.is_nil() {
                    self.evaluate(args[2], env)
                } else {
                    self.evaluate(args[1], env)
                }
            }
            SpecialForm::Label => {
                let name = args[0];
                if name.get_type() != Tag::Symbol {
                    let name = self.display(name).to_string();
                    return Err(self.raise(EvalError::ExpectedIdentifier(name)));
                }

                let value = self.evaluate(args[1], env)?;
                let env = self.extend(name, value, env);
                self.evaluate(args[2], env)
            }
            SpecialForm::Lambda => self.make_closure(Tag::Lambda, args[0], args[1], env),
            SpecialForm::Macro => self.make_closure(Tag::Macro, args[0], args[1], env),
        }
    }

    /// Captures a parameter list, a body and the current environment in a closure record: a three
    /// element list whose address becomes the payload of the LAMBDA or MACRO value.
    fn make_closure(&mut self, tag: Tag, params: Value, body: Value, env: Value) -> Outcome {
        let Some(names) = self.list_to_vec(params) else {
            let params = self.display(params).to_string();
            return Err(self.raise(EvalError::ExpectedList(params)));
        };

        if let Some(name) = names.iter().find(|name| name.get_type() != Tag::Symbol) {
            let name = self.display(*name).to_string();
            return Err(self.raise(EvalError::ExpectedIdentifier(name)));
        }

        let record = self.list(&[params, body, env]);
        Ok(record.retag(tag))
    }

    /// Reads back the parameter list, body and captured environment of a closure record.
    pub fn closure_parts(&self, record: Address) -> (Value, Value, Value) {
        let record = Value::from_parts(Tag::Cons, record.0);
        let params = self.car(record);
        let rest = self.cdr(record);
        let body = self.car(rest);
        let env = self.car(self.cdr(rest));
        (params, body, env)
    }

    /// Binds parameters to arguments position-wise on top of `env`.
    fn bind(&mut self, params: Value, args: &[Value], env: Value) -> Outcome {
        let params = self.list_to_vec(params).unwrap_or_default();

        if params.len() != args.len() {
            return Err(self.raise(EvalError::WrongArity(params.len(), args.len())));
        }

        Ok(params
            .into_iter()
            .zip(args)
            .fold(env, |env, (param, arg)| self.extend(param, *arg, env)))
    }

    fn apply_lambda(&mut self, record: Address, operands: &[Value]) -> Outcome {
        let (params, body, captured) = self.closure_parts(record);
        log::trace!("applying lambda {record:?} to {} operands", operands.len());

        let env = self.bind(params, operands, captured)?;
        self.evaluate(body, env)
    }

    /// Expands a macro call and evaluates the expansion. The body runs with the raw argument syntax
    /// bound on top of the macro's captured environment, and its result runs again in the caller's
    /// environment.
    fn expand_macro(&mut self, record: Address, args: &[Value], env: Value) -> Outcome {
        let (params, body, captured) = self.closure_parts(record);

        let macro_env = self.bind(params, args, captured)?;
        let expansion = self.evaluate(body, macro_env)?;
        log::trace!("expanded macro form: {}", self.display(expansion));

        self.evaluate(expansion, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Config;
    use crate::reader::read;

    fn run(source: &str) -> String {
        let mut machine = Machine::new();
        let env = machine.builtin_environment();
        let exprs = read(&mut machine, source).unwrap();
        let expr = *exprs.last().unwrap();
        let result = machine.eval(expr, env);
        machine.display(result).to_string()
    }

    #[test]
    fn numbers_evaluate_to_themselves() {
        assert_eq!(run("42"), "42");
        assert_eq!(run("-7"), "-7");
    }

    #[test]
    fn quote_returns_its_argument_verbatim() {
        assert_eq!(run("(quote foo)"), "foo");
        assert_eq!(run("'(a (b c))"), "(a (b c))");
        assert_eq!(run("(quote (undefined 1))"), "(undefined 1)");
    }

    #[test]
    fn if_branches_on_nil_only() {
        assert_eq!(run("(if 1 2 3)"), "2");
        assert_eq!(run("(if nil 2 3)"), "3");
        assert_eq!(run("(if 0 2 3)"), "2");
        assert_eq!(run("(if (atom '(1)) 2 3)"), "3");
    }

    #[test]
    fn if_only_evaluates_the_chosen_branch() {
        assert_eq!(run("(if 1 2 undefined)"), "2");
        assert_eq!(run("(if nil undefined 3)"), "3");
    }

    #[test]
    fn label_binds_in_the_body_only() {
        assert_eq!(run("(label x 42 x)"), "42");
        assert_eq!(
            run("(label x 1 (label x (cons x x) x))"),
            "(1 . 1)"
        );
        assert_eq!(
            run("(label x x x)"),
            "#<error: unbound symbol 'x'>"
        );
    }

    #[test]
    fn lambdas_bind_their_parameters() {
        assert_eq!(run("((lambda (x) x) 42)"), "42");
        assert_eq!(run("((lambda (x y) (cons x y)) 1 2)"), "(1 . 2)");
        assert_eq!(run("((lambda () 7))"), "7");
    }

    #[test]
    fn lambdas_check_their_arity() {
        assert_eq!(
            run("((lambda (x y) (cons x y)) 1)"),
            "#<error: wrong arity, expected 2 arguments, got 1>"
        );
        assert_eq!(
            run("((lambda (x y) (cons x y)) 1 2 3)"),
            "#<error: wrong arity, expected 2 arguments, got 3>"
        );
    }

    #[test]
    fn closures_use_the_environment_they_were_created_in() {
        let source = "(label x 1 (label f (lambda () x) (label x 2 (f))))";
        assert_eq!(run(source), "1");

        let adder = "(label make (lambda (n) (lambda (m) (cons n m))) ((make 1) 2))";
        assert_eq!(run(adder), "(1 . 2)");
    }

    #[test]
    fn macros_expand_then_evaluate_in_the_caller() {
        let double = "((macro (x) (cons (quote cons) (cons x (cons x nil)))) 5)";
        assert_eq!(run(double), "(5 . 5)");

        let caller = "(label y 9 ((macro (x) x) y))";
        assert_eq!(run(caller), "9");
    }

    #[test]
    fn macros_receive_unevaluated_syntax() {
        assert_eq!(run("((macro (x) (cons 'quote (cons x nil))) (undefined 1))"), "(undefined 1)");
        assert_eq!(
            run("((macro (x y) x))"),
            "#<error: wrong arity, expected 2 arguments, got 0>"
        );
        assert_eq!(
            run("((macro (x) x) 1 2)"),
            "#<error: wrong arity, expected 1 arguments, got 2>"
        );
    }

    #[test]
    fn macro_bodies_see_their_captured_environment() {
        let source = "(label q 'quote (label m (macro (x) (cons q (cons x nil))) (label q 1 (m z))))";
        assert_eq!(run(source), "z");
    }

    #[test]
    fn builtins_dispatch_by_id() {
        assert_eq!(run("(cons 1 2)"), "(1 . 2)");
        assert_eq!(run("(car '(1 2))"), "1");
        assert_eq!(run("(cdr '(1 2))"), "(2)");
        assert_eq!(run("(atom 1)"), "1");
        assert_eq!(run("(atom '(1))"), "nil");
        assert_eq!(run("(eq 'a 'a)"), "nil");
        assert_eq!(run("(eq 1 1)"), "1");
        assert_eq!(run("(label x '(1) (eq x x))"), "1");
    }

    #[test]
    fn calling_non_callables_is_an_error() {
        assert_eq!(run("(1 2)"), "#<error: cannot call as function '1'>");
        assert_eq!(run("('(1) 2)"), "#<error: cannot call as function '(1)'>");
        assert_eq!(run("(nil)"), "#<error: cannot call as function 'nil'>");
        assert_eq!(run("(label x 1 (x))"), "#<error: cannot call as function '1'>");
        assert_eq!(run("(label x 1 (x undefined))"), "#<error: cannot call as function '1'>");
    }

    #[test]
    fn errors_short_circuit_operands() {
        assert_eq!(
            run("(cons missing (car 5))"),
            "#<error: unbound symbol 'missing'>"
        );
        assert_eq!(run("(if nope 1 2)"), "#<error: unbound symbol 'nope'>");
        assert_eq!(run("(nope 1 2)"), "#<error: unbound symbol 'nope'>");
    }

    #[test]
    fn malformed_special_forms_are_errors() {
        assert_eq!(
            run("(quote)"),
            "#<error: malformed quote: expected 1 arguments, got 0>"
        );
        assert_eq!(
            run("(if 1 2)"),
            "#<error: malformed if: expected 3 arguments, got 2>"
        );
        assert_eq!(
            run("(label 1 2 3)"),
            "#<error: expected an identifier but got '1'>"
        );
        assert_eq!(
            run("(lambda (x 1) x)"),
            "#<error: expected an identifier but got '1'>"
        );
    }

    #[test]
    fn self_evaluating_values_are_stable() {
        let mut machine = Machine::new();
        let env = machine.builtin_environment();
        let lambda = read(&mut machine, "(lambda (x) x)").unwrap()[0];
        let closure = machine.eval(lambda, env);

        let error = machine.error("boom");
        for value in [
            Value::nil(),
            Value::make_number(3),
            Value::make_builtin(1),
            Value::make_bytes1(b'a'),
            closure,
            error,
        ] {
            assert_eq!(machine.eval(value, env), value);
            assert_eq!(machine.eval(value, Value::nil()), value);
        }
    }

    #[test]
    fn closures_record_their_parts() {
        let mut machine = Machine::new();
        let env = machine.builtin_environment();
        let expr = read(&mut machine, "(lambda (x) (car x))").unwrap()[0];
        let closure = machine.eval(expr, env);

        let Kind::Lambda(record) = closure.kind() else {
            panic!("expected a lambda, got {closure:?}");
        };
        let (params, body, captured) = machine.closure_parts(record);
        assert_eq!(machine.display(params).to_string(), "(x)");
        assert_eq!(machine.display(body).to_string(), "(car x)");
        assert_eq!(captured, env);
    }

    #[test]
    fn deep_recursion_is_bounded() {
        let mut machine = Machine::with_config(Config { max_depth: 16 });
        let env = machine.builtin_environment();
        let source = "(label y (lambda (f) (f f)) (y y))";
        let expr = read(&mut machine, source).unwrap()[0];
        let result = machine.eval(expr, env);

        assert_eq!(
            machine.error_text(result).as_deref(),
            Some("recursion depth exceeded (16 nested evaluations)")
        );
        assert_eq!(machine.depth, 0);
    }

    #[test]
    fn zero_depth_still_evaluates_atoms() {
        let mut machine = Machine::with_config(Config { max_depth: 0 });
        let env = machine.builtin_environment();
        let exprs = read(&mut machine, "42 car (cons 1 2)").unwrap();

        assert_eq!(machine.eval(exprs[0], env), Value::make_number(42));
        assert_eq!(machine.eval(exprs[1], env), Builtin::Car.to_value());

        let result = machine.eval(exprs[2], env);
        assert_eq!(
            machine.error_text(result).as_deref(),
            Some("recursion depth exceeded (0 nested evaluations)")
        );
    }

    #[test]
    fn default_depth_is_reached_on_a_small_thread() {
        let text = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let mut machine = Machine::new();
                let env = machine.builtin_environment();
                let source = "(label f (lambda (g) (cons 1 (g g))) (f f))";
                let expr = read(&mut machine, source).unwrap()[0];
                let result = machine.eval(expr, env);
                machine.error_text(result)
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(
            text.as_deref(),
            Some("recursion depth exceeded (2048 nested evaluations)")
        );
    }

    #[test]
    fn deeply_quoted_data_evaluates_and_prints() {
        let depth = 200_000;
        let source = format!("'{}1{}", "(".repeat(depth), ")".repeat(depth));
        let printed = run(&source);

        assert_eq!(printed.len(), 2 * depth + 1);
        assert!(printed.starts_with("((("));
    }

    #[test]
    fn error_raises_a_named_error() {
        assert_eq!(run("(error 'oops)"), "#<error: oops>");
        assert_eq!(run("(cons (error 'first) (error 'second))"), "#<error: first>");
        assert_eq!(run("(if (error 'cond) 1 2)"), "#<error: cond>");
        assert_eq!(run("(error 1)"), "#<error: non-symbol error '1'>");
    }

    #[test]
    fn apply_calls_functions_on_a_list() {
        assert_eq!(run("(apply cons '(1 2))"), "(1 . 2)");
        assert_eq!(run("(apply (lambda (x) (cons x x)) '(3))"), "(3 . 3)");
        assert_eq!(run("(apply apply (cons car (cons '((1 2)) nil)))"), "1");
        assert_eq!(run("(apply (macro (x) x) '(1))"), "#<error: apply non function '#<macro>'>");
        assert_eq!(run("(apply 'car '((1)))"), "#<error: apply non function 'car'>");
        assert_eq!(run("(apply car 5)"), "#<error: apply to non list '5'>");
        assert_eq!(
            run("(apply cons '(1))"),
            "#<error: wrong arity, expected 2 arguments, got 1>"
        );
    }

    #[test]
    fn t_is_bound_to_itself() {
        assert_eq!(run("t"), "t");
        assert_eq!(run("(if t 'yes 'no)"), "yes");
    }
}
