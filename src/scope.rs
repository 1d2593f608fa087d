//! The scope tree and the context pass that builds it
//!
//! The context pass runs between parsing and the proof pass. It records, for
//! every variable, the scope it was declared in and its type — the proof
//! pass reads this to compute the prover atom's scope prefix — and it checks
//! that value names are produced consistently: a value name created on only
//! one arm of an `if` statement is not defined afterwards, and code that
//! would rely on it is refused here, before any proof is attempted.

use crate::ast::{
    Block, BlockStmt, ClassDecl, Expr, ExprKind, Member, MethodDecl, NodeId, Stmt, StmtKind,
};
use crate::report::Reports;
use crate::tokens::Token;
use std::collections::{BTreeSet, HashMap};

pub const COMPONENT: &str = "ContextCheck";

/// Index of a scope in the [`ScopeMap`] arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// What we know about one declared variable
#[derive(Debug, Clone)]
pub struct VarInfo {
    /// The scope the variable was declared in; its label decides the prover
    /// atom's prefix
    pub declared_in: ScopeId,
    /// The type, by its spelling in the source (`boolean`, `int`, ...)
    pub var_type: String,
}

/// One node of the scope tree
#[derive(Debug)]
pub struct Scope {
    /// Empty for executable-level locals, `this` for instance fields, or a
    /// type label
    pub label: String,
    pub parent: Option<ScopeId>,
    vars: HashMap<String, VarInfo>,
}

/// The scope tree plus the node-to-scope mapping, as consumed by the proof
/// pass
#[derive(Debug, Default)]
pub struct ScopeMap {
    scopes: Vec<Scope>,
    by_node: HashMap<NodeId, ScopeId>,
}

impl ScopeMap {
    fn add_scope(&mut self, label: &str, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            label: label.into(),
            parent,
            vars: HashMap::new(),
        });
        id
    }

    /// The scope entered at the given parse node, if the node opens one
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.by_node.get(&node).copied()
    }

    /// Looks a variable up from the given scope, bubbling to parents
    pub fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<&VarInfo> {
        loop {
            let s = &self.scopes[scope.0];
            if let Some(info) = s.vars.get(name) {
                return Some(info);
            }
            scope = s.parent?;
        }
    }

    pub fn label(&self, scope: ScopeId) -> &str {
        &self.scopes[scope.0].label
    }

    /// The prefix for a prover atom: the declaring scope's label followed by
    /// a dot, or nothing for executable-level locals and unknown names
    pub fn scope_prefix(&self, scope: ScopeId, variable_name: &str) -> String {
        match self.lookup(scope, variable_name) {
            Some(info) => {
                let label = self.label(info.declared_in);
                if label.is_empty() {
                    String::new()
                } else {
                    format!("{}.", label)
                }
            }
            None => String::new(),
        }
    }

    /// Whether the variable's declared type is boolean (primitive or boxed)
    pub fn is_boolean(&self, scope: ScopeId, variable_name: &str) -> bool {
        matches!(
            self.lookup(scope, variable_name).map(|i| i.var_type.as_str()),
            Some("boolean") | Some("Boolean")
        )
    }
}

/// Runs the context pass over the parsed classes, reporting problems into
/// the sink
pub fn resolve<'a>(classes: &[ClassDecl<'a>], reports: &mut Reports<'a>) -> ScopeMap {
    let mut r = Resolver {
        map: ScopeMap::default(),
        reports,
    };
    for class in classes {
        r.class(class);
    }
    r.map
}

struct Resolver<'r, 'a> {
    map: ScopeMap,
    reports: &'r mut Reports<'a>,
}

impl<'r, 'a> Resolver<'r, 'a> {
    fn class(&mut self, class: &ClassDecl<'a>) {
        let class_scope = self.map.add_scope("this", None);
        self.map.by_node.insert(class.id, class_scope);

        // Fields first, so methods see them regardless of ordering
        for member in &class.members {
            if let Member::Field(field) = member {
                for name in &field.names {
                    self.declare(class_scope, name.tok, field.var_type.tok.src);
                }
            }
        }

        for member in &class.members {
            if let Member::Method(method) = member {
                self.method(class_scope, method);
            }
        }
    }

    fn method(&mut self, class_scope: ScopeId, method: &MethodDecl<'a>) {
        let method_scope = self.map.add_scope("", Some(class_scope));
        self.map.by_node.insert(method.id, method_scope);

        for (ty, name) in &method.params {
            self.declare(method_scope, name.tok, ty.tok.src);
        }

        self.block(method_scope, &method.body);

        if let Some(means) = &method.means {
            self.expr(method_scope, &means.expr);
        }
    }

    fn block(&mut self, parent: ScopeId, block: &Block<'a>) {
        let scope = self.map.add_scope("", Some(parent));
        self.map.by_node.insert(block.id, scope);

        for bs in &block.stmts {
            match bs {
                BlockStmt::Decl(decl) => {
                    for d in &decl.declarators {
                        self.declare(scope, d.name.tok, decl.var_type.tok.src);
                        if let Some((_, init)) = &d.init {
                            self.expr(scope, init);
                        }
                    }
                }
                BlockStmt::Stmt(stmt) => self.stmt(scope, stmt),
            }
        }
    }

    fn stmt(&mut self, scope: ScopeId, stmt: &Stmt<'a>) {
        match &stmt.kind {
            StmtKind::Block(block) => self.block(scope, block),
            StmtKind::Assign { target, value, .. } => {
                self.expr(scope, target);
                self.expr(scope, value);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(scope, cond);
                self.stmt(scope, then_branch);
                if let Some(e) = else_branch {
                    self.stmt(scope, e);
                }
                self.check_branch_definitions(stmt, then_branch, else_branch.as_deref());
            }
            StmtKind::While { cond, body } => {
                self.expr(scope, cond);
                self.stmt(scope, body);
            }
            StmtKind::Return { value } => {
                if let Some(v) = value {
                    self.expr(scope, v);
                }
            }
            StmtKind::Means(means) => self.expr(scope, &means.expr),
            StmtKind::Empty => (),
        }
    }

    fn expr(&mut self, scope: ScopeId, expr: &Expr<'a>) {
        match &expr.kind {
            ExprKind::Literal(_) => (),
            ExprKind::Name(tok) => self.check_reference(scope, tok.tok),
            ExprKind::FieldAccess { base, field } => {
                // `this.x` resolves through the ordinary chain; other bases
                // are out of reach for this pass
                match &base.kind {
                    ExprKind::Name(b) if b.tok.src == "this" => {
                        self.check_reference(scope, field.tok)
                    }
                    _ => self.expr(scope, base),
                }
            }
            ExprKind::Index { base, index } => {
                self.expr(scope, base);
                self.expr(scope, index);
            }
            ExprKind::Call { callee, args } => {
                // The callee names a method, not a variable
                if !matches!(callee.kind, ExprKind::Name(_)) {
                    self.expr(scope, callee);
                }
                for a in args {
                    self.expr(scope, a);
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(scope, operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(scope, lhs);
                self.expr(scope, rhs);
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.expr(scope, cond);
                self.expr(scope, then_expr);
                self.expr(scope, else_expr);
            }
            ExprKind::InstanceOf { expr, .. } => self.expr(scope, expr),
            ExprKind::Paren(inner) => self.expr(scope, inner),
        }
    }

    fn declare(&mut self, scope: ScopeId, name: Token<'a>, var_type: &str) {
        let var = name.variable_name().to_string();
        let vars = &mut self.map.scopes[scope.0].vars;
        if vars.contains_key(&var) {
            self.reports.collect(
                COMPONENT,
                Some(name),
                format!("variable {} is declared twice in the same scope", var),
            );
            return;
        }
        vars.insert(
            var,
            VarInfo {
                declared_in: scope,
                var_type: var_type.to_string(),
            },
        );
    }

    fn check_reference(&mut self, scope: ScopeId, tok: Token<'a>) {
        let var = tok.variable_name();
        if var == "this" || var == "return" {
            return;
        }
        if self.map.lookup(scope, var).is_none() {
            self.reports.collect(
                COMPONENT,
                Some(tok),
                format!("variable {} is not declared", var),
            );
        }
    }

    /// A value name produced on only one arm of an `if` is undefined below
    /// the statement; report each such variable. A missing else-arm counts
    /// as an empty branch.
    fn check_branch_definitions(
        &mut self,
        if_stmt: &Stmt<'a>,
        then_branch: &Stmt<'a>,
        else_branch: Option<&Stmt<'a>>,
    ) {
        let then_vars = assigned_variables(then_branch);
        let else_vars = else_branch.map(assigned_variables).unwrap_or_default();

        let if_token = match &if_stmt.kind {
            StmtKind::If { cond, .. } => leftmost_token(cond),
            _ => None,
        };
        for var in then_vars.difference(&else_vars) {
            self.reports.collect(
                COMPONENT,
                if_token,
                format!(
                    "value name {}' is not defined for the else-branch of the if statement",
                    var
                ),
            );
        }
        for var in else_vars.difference(&then_vars) {
            self.reports.collect(
                COMPONENT,
                if_token,
                format!(
                    "value name {}' is not defined for the then-branch of the if statement",
                    var
                ),
            );
        }
    }
}

/// The variables a branch assigns to, minus those it declares itself (a
/// branch-local variable does not escape the branch)
fn assigned_variables(stmt: &Stmt) -> BTreeSet<String> {
    let mut assigned = BTreeSet::new();
    let mut declared = BTreeSet::new();
    collect_assigned(stmt, &mut assigned, &mut declared);
    assigned.difference(&declared).cloned().collect()
}

fn collect_assigned(stmt: &Stmt, assigned: &mut BTreeSet<String>, declared: &mut BTreeSet<String>) {
    match &stmt.kind {
        StmtKind::Block(block) => {
            for bs in &block.stmts {
                match bs {
                    BlockStmt::Decl(decl) => {
                        for d in &decl.declarators {
                            declared.insert(d.name.tok.variable_name().to_string());
                        }
                    }
                    BlockStmt::Stmt(s) => collect_assigned(s, assigned, declared),
                }
            }
        }
        StmtKind::Assign { target, .. } => {
            if let Some(tok) = assign_target_token(target) {
                assigned.insert(tok.variable_name().to_string());
            }
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_assigned(then_branch, assigned, declared);
            if let Some(e) = else_branch {
                collect_assigned(e, assigned, declared);
            }
        }
        StmtKind::While { body, .. } => collect_assigned(body, assigned, declared),
        StmtKind::Return { .. } | StmtKind::Means(_) | StmtKind::Empty => (),
    }
}

/// The token naming the variable an assignment writes
fn assign_target_token<'a>(target: &Expr<'a>) -> Option<Token<'a>> {
    match &target.kind {
        ExprKind::Name(tok) => Some(tok.tok),
        ExprKind::FieldAccess { field, .. } => Some(field.tok),
        _ => None,
    }
}

/// The first token inside an expression, the anchor for branch errors (the
/// `if` keyword itself isn't kept in the tree)
fn leftmost_token<'a>(expr: &Expr<'a>) -> Option<Token<'a>> {
    match &expr.kind {
        ExprKind::Literal(t) | ExprKind::Name(t) => Some(t.tok),
        ExprKind::FieldAccess { base, .. } => leftmost_token(base),
        ExprKind::Index { base, .. } => leftmost_token(base),
        ExprKind::Call { callee, .. } => leftmost_token(callee),
        ExprKind::Unary { op, .. } => Some(op.tok),
        ExprKind::Binary { lhs, .. } => leftmost_token(lhs),
        ExprKind::Conditional { cond, .. } => leftmost_token(cond),
        ExprKind::InstanceOf { expr, .. } => leftmost_token(expr),
        ExprKind::Paren(inner) => leftmost_token(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::try_parse;
    use crate::tokens::tokenize;

    fn resolve_src<'a>(tokens: &'a [Token<'a>]) -> (ScopeMap, Reports<'a>) {
        let classes = try_parse(tokens).expect("parse error");
        let mut reports = Reports::new();
        let map = resolve(&classes, &mut reports);
        (map, reports)
    }

    #[test]
    fn fields_get_the_this_prefix_and_locals_none() {
        let tokens = tokenize(
            "class Pair {
                int a, b;
                void swap() {
                    int startingA' = 'a;
                    a' = 'b;
                }
            }",
        );
        let classes = try_parse(&tokens).unwrap();
        let mut reports = Reports::new();
        let map = resolve(&classes, &mut reports);
        assert!(reports.is_empty(), "{:?}", reports.records());

        let method = match &classes[0].members[1] {
            Member::Method(m) => m,
            m => panic!("expected a method, got {:?}", m),
        };
        let body_scope = map.scope_of(method.body.id).unwrap();
        assert_eq!(map.scope_prefix(body_scope, "a"), "this.");
        assert_eq!(map.scope_prefix(body_scope, "startingA"), "");
    }

    #[test]
    fn boolean_detection_uses_the_declared_type() {
        let tokens = tokenize(
            "class C {
                boolean flag;
                void set() { flag' = true; }
            }",
        );
        let (map, reports) = resolve_src(&tokens);
        assert!(reports.is_empty(), "{:?}", reports.records());
        let class_scope = ScopeId(0);
        assert!(map.is_boolean(class_scope, "flag"));
        assert!(!map.is_boolean(class_scope, "missing"));
    }

    #[test]
    fn undeclared_variable_is_reported() {
        let tokens = tokenize("class C { void m() { x' = 'y; } }");
        let (_, reports) = resolve_src(&tokens);
        let messages: Vec<_> = reports.records().iter().map(|r| &r.message).collect();
        assert!(messages.iter().any(|m| m.contains("x is not declared")));
        assert!(messages.iter().any(|m| m.contains("y is not declared")));
    }

    #[test]
    fn one_armed_assignment_is_refused() {
        let tokens = tokenize(
            "class Rates {
                int rate, reportRate;
                void report(int premium) {
                    if (premium > 0) { rate' = 'rate + 1; }
                    reportRate' = rate';
                }
            }",
        );
        let (_, reports) = resolve_src(&tokens);
        let expected = "value name rate' is not defined for the else-branch of the if statement";
        assert!(
            reports.records().iter().any(|r| r.message == expected),
            "missing {:?} in {:?}",
            expected,
            reports.records()
        );
    }

    #[test]
    fn both_armed_assignment_is_fine() {
        let tokens = tokenize(
            "class Pair {
                int a, b;
                void sort() {
                    if ('a > 'b) { int t' = 'a; a' = 'b; b' = t'; }
                    else { a' = 'a; b' = 'b; }
                }
            }",
        );
        let (_, reports) = resolve_src(&tokens);
        assert!(reports.is_empty(), "{:?}", reports.records());
    }
}
