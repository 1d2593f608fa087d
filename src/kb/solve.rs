//! The decision core behind the knowledge base
//!
//! A query asks whether the assumed facts entail a goal. The facts are
//! normalized (negations pushed onto the comparisons, implications expanded)
//! and split into disjunctive-normal-form cases; the goal must hold in every
//! case. Within one case the engine combines two views of the literals:
//!
//! - a congruence closure over interned terms — equalities merge classes, a
//!   bare boolean fact is an equality with `true`, and compound terms with
//!   merged children merge too;
//! - a difference graph over class representatives — a comparison whose two
//!   sides differ by a linear term with unit coefficients becomes an edge
//!   `u - v <= k`, and queries run shortest-path over the graph. Strict
//!   comparisons are tightened to `u - v <= k - 1`: the translated programs
//!   compare integers (floats never linearize, so they never reach the
//!   graph).
//!
//! Arithmetic is canonicalized into a linear normal form first (flattening,
//! constant folding, gcd-reduced coefficients) so different spellings of the
//! same sum intern to the same term. A case whose facts are contradictory is
//! entailed vacuously.
//!
//! The engine is deliberately incomplete: an unproven true statement is
//! reported unproven, never the other way around. All work is metered; when
//! the budget runs out the query fails with [`LimitReached`] rather than an
//! answer.

use super::formula::{Op, Term};
use gcd::Gcd;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Resource bounds for one query
#[derive(Debug, Clone)]
pub struct Budget {
    /// Cap on disjunctive-normal-form cases
    pub max_cases: usize,
    /// Cap on closure iterations, edge relaxations, and goal steps
    pub max_steps: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Budget {
            max_cases: 512,
            max_steps: 200_000,
        }
    }
}

/// The query ran out of budget before reaching an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitReached;

/// Whether `facts` entail `goal` within the given budget
pub fn entails(facts: &[Term], goal: &Term, budget: &Budget) -> Result<bool, LimitReached> {
    let mut counter = Counter {
        steps: 0,
        max: budget.max_steps,
    };

    // Split the conjunction of all facts into DNF cases
    let mut cases: Vec<Vec<Term>> = vec![Vec::new()];
    for fact in facts {
        let clauses = dnf(&nnf(fact, true), budget)?;
        let mut next = Vec::with_capacity(cases.len());
        for case in &cases {
            for clause in &clauses {
                if next.len() >= budget.max_cases {
                    return Err(LimitReached);
                }
                let mut merged = case.clone();
                merged.extend(clause.iter().cloned());
                next.push(merged);
            }
        }
        cases = next;
    }

    for case in &cases {
        let mut model = Model::new(&mut counter);
        model.load(case)?;
        if model.contradictory {
            // Vacuous: these facts cannot all hold at once
            continue;
        }
        if !model.holds(goal)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Negation normal form: `Not` pushed down to the literals, implications
/// expanded, comparisons flipped instead of negated
fn nnf(t: &Term, positive: bool) -> Term {
    match t {
        Term::Not(inner) => nnf(inner, !positive),
        Term::Bin(Op::And, l, r) => {
            let op = if positive { Op::And } else { Op::Or };
            Term::bin(op, nnf(l, positive), nnf(r, positive))
        }
        Term::Bin(Op::Or, l, r) => {
            let op = if positive { Op::Or } else { Op::And };
            Term::bin(op, nnf(l, positive), nnf(r, positive))
        }
        Term::Bin(Op::Implies, l, r) => {
            if positive {
                Term::bin(Op::Or, nnf(l, false), nnf(r, true))
            } else {
                Term::bin(Op::And, nnf(l, true), nnf(r, false))
            }
        }
        Term::Bin(op, l, r) if op.is_logical() => {
            let flipped = match op {
                Op::Eq => Op::Ne,
                Op::Ne => Op::Eq,
                Op::Lt => Op::Ge,
                Op::Le => Op::Gt,
                Op::Gt => Op::Le,
                Op::Ge => Op::Lt,
                _ => unreachable!(),
            };
            let op = if positive { *op } else { flipped };
            Term::Bin(op, l.clone(), r.clone())
        }
        Term::Bool(b) => Term::Bool(*b == positive),
        // Everything else is a boolean leaf (atom, application, ...)
        _ if positive => t.clone(),
        _ => Term::not(t.clone()),
    }
}

/// Disjunctive normal form of an NNF term, as a list of literal lists
fn dnf(t: &Term, budget: &Budget) -> Result<Vec<Vec<Term>>, LimitReached> {
    match t {
        Term::Bin(Op::Or, l, r) => {
            let mut out = dnf(l, budget)?;
            out.extend(dnf(r, budget)?);
            if out.len() > budget.max_cases {
                return Err(LimitReached);
            }
            Ok(out)
        }
        Term::Bin(Op::And, l, r) => {
            let ls = dnf(l, budget)?;
            let rs = dnf(r, budget)?;
            let mut out = Vec::with_capacity(ls.len() * rs.len());
            for a in &ls {
                for b in &rs {
                    if out.len() >= budget.max_cases {
                        return Err(LimitReached);
                    }
                    let mut case = a.clone();
                    case.extend(b.iter().cloned());
                    out.push(case);
                }
            }
            Ok(out)
        }
        _ => Ok(vec![vec![t.clone()]]),
    }
}

/// A linear combination of opaque terms with integer coefficients
#[derive(Debug, Clone, Default)]
struct Lin {
    coeffs: BTreeMap<Term, i128>,
    konst: i128,
}

/// The recognized shapes of a linear difference, after reduction
enum Shape {
    /// No variables left
    Const(i128),
    /// `pos - neg + konst`, where `None` stands for zero
    Diff {
        pos: Option<Term>,
        neg: Option<Term>,
        konst: i128,
    },
    /// Anything else (several variables, non-unit coefficients)
    Other,
}

impl Lin {
    fn add_coeff(&mut self, key: Term, c: i128) {
        let entry = self.coeffs.entry(key.clone()).or_insert(0);
        *entry += c;
        if *entry == 0 {
            self.coeffs.remove(&key);
        }
    }

    fn combine(mut self, other: Lin, sign: i128) -> Lin {
        for (k, c) in other.coeffs {
            self.add_coeff(k, c * sign);
        }
        self.konst += other.konst * sign;
        self
    }

    fn scale(mut self, by: i128) -> Lin {
        if by == 0 {
            return Lin::default();
        }
        for c in self.coeffs.values_mut() {
            *c *= by;
        }
        self.konst *= by;
        self
    }

    /// Divides every coefficient and the constant by their common gcd, when
    /// the constant permits it
    fn reduced(mut self) -> Lin {
        let g = self
            .coeffs
            .values()
            .map(|c| c.unsigned_abs())
            .fold(0u128, |a, b| a.gcd(b));
        if g > 1 && self.konst.unsigned_abs() % g == 0 {
            for c in self.coeffs.values_mut() {
                *c /= g as i128;
            }
            self.konst /= g as i128;
        }
        self
    }

    fn shape(self) -> Shape {
        let reduced = self.reduced();
        let mut pos = None;
        let mut neg = None;
        for (k, c) in reduced.coeffs {
            match c {
                1 if pos.is_none() => pos = Some(k),
                -1 if neg.is_none() => neg = Some(k),
                _ => return Shape::Other,
            }
        }
        match (&pos, &neg) {
            (None, None) => Shape::Const(reduced.konst),
            _ => Shape::Diff {
                pos,
                neg,
                konst: reduced.konst,
            },
        }
    }

    /// Rebuilds the canonical term this combination denotes
    fn to_term(&self) -> Term {
        if self.coeffs.is_empty() {
            return Term::Int(self.konst);
        }
        if self.coeffs.len() == 1 && self.konst == 0 {
            let (k, &c) = self.coeffs.iter().next().unwrap();
            if c == 1 {
                return k.clone();
            }
        }
        let mut acc: Option<Term> = None;
        for (k, &c) in &self.coeffs {
            let factor = if c == 1 {
                k.clone()
            } else {
                Term::bin(Op::Mul, Term::Int(c), k.clone())
            };
            acc = Some(match acc {
                None => factor,
                Some(a) => Term::bin(Op::Add, a, factor),
            });
        }
        let mut out = acc.unwrap();
        if self.konst != 0 {
            out = Term::bin(Op::Add, out, Term::Int(self.konst));
        }
        out
    }
}

/// Linearizes an arithmetic term; `None` when the term has no integer linear
/// structure (floats, general division, a product of two variables)
fn linearize(t: &Term) -> Option<Lin> {
    match t {
        Term::Int(n) => Some(Lin {
            coeffs: BTreeMap::new(),
            konst: *n,
        }),
        Term::Bin(Op::Add, l, r) => Some(linearize(l)?.combine(linearize(r)?, 1)),
        Term::Bin(Op::Sub, l, r) => Some(linearize(l)?.combine(linearize(r)?, -1)),
        Term::Bin(Op::Mul, l, r) => {
            let ll = linearize(l)?;
            let rl = linearize(r)?;
            if ll.coeffs.is_empty() {
                Some(rl.scale(ll.konst))
            } else if rl.coeffs.is_empty() {
                Some(ll.scale(rl.konst))
            } else {
                None
            }
        }
        Term::Bin(Op::Div, l, r) => {
            let ll = linearize(l)?;
            let rl = linearize(r)?;
            if ll.coeffs.is_empty() && rl.coeffs.is_empty() && rl.konst != 0
                && ll.konst % rl.konst == 0
            {
                Some(Lin {
                    coeffs: BTreeMap::new(),
                    konst: ll.konst / rl.konst,
                })
            } else {
                None
            }
        }
        Term::Atom(_) | Term::Ident(_) | Term::App(..) => {
            let mut lin = Lin::default();
            lin.add_coeff(canonical(t), 1);
            Some(lin)
        }
        Term::Float(_) | Term::Bool(_) | Term::Not(_) | Term::Bin(..) => None,
    }
}

/// The canonical spelling of a term: arithmetic in linear normal form,
/// applications with canonical arguments
fn canonical(t: &Term) -> Term {
    match t {
        Term::App(f, args) => Term::App(f.clone(), args.iter().map(canonical).collect()),
        Term::Bin(op, l, r) if !op.is_logical() => match linearize(t) {
            Some(lin) => lin.to_term(),
            None => Term::bin(*op, canonical(l), canonical(r)),
        },
        Term::Bin(op, l, r) => Term::bin(*op, canonical(l), canonical(r)),
        Term::Not(x) => Term::not(canonical(x)),
        _ => t.clone(),
    }
}

struct Counter {
    steps: usize,
    max: usize,
}

impl Counter {
    fn tick(&mut self) -> Result<(), LimitReached> {
        self.steps += 1;
        if self.steps > self.max {
            Err(LimitReached)
        } else {
            Ok(())
        }
    }
}

/// The head symbol of a compound term, for congruence signatures
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Head {
    App(String),
    Bin(Op),
    Not,
}

struct Entry {
    head: Option<Head>,
    children: Vec<usize>,
    int_value: Option<i128>,
}

/// An edge `from - to <= k`, over term ids (strict comparisons arrive
/// pre-tightened to `k - 1`)
struct Edge {
    from: usize,
    to: usize,
    k: i128,
}

/// One case's worth of knowledge: interned terms, their equivalence classes,
/// the difference graph, and recorded disequalities
struct Model<'c> {
    counter: &'c mut Counter,
    entries: Vec<Entry>,
    ids: HashMap<Term, usize>,
    parent: Vec<usize>,
    edges: Vec<Edge>,
    diseqs: Vec<(usize, usize)>,
    /// Comparisons the graph can't carry, by (op, lhs, rhs) term ids with
    /// op normalized to `Lt`/`Le`
    cmp_facts: HashSet<(Op, usize, usize)>,
    contradictory: bool,
    true_id: usize,
    false_id: usize,
    zero_id: usize,
}

impl<'c> Model<'c> {
    fn new(counter: &'c mut Counter) -> Self {
        let mut model = Model {
            counter,
            entries: Vec::new(),
            ids: HashMap::new(),
            parent: Vec::new(),
            edges: Vec::new(),
            diseqs: Vec::new(),
            cmp_facts: HashSet::new(),
            contradictory: false,
            true_id: 0,
            false_id: 0,
            zero_id: 0,
        };
        model.true_id = model.intern(&Term::Bool(true));
        model.false_id = model.intern(&Term::Bool(false));
        model.zero_id = model.intern(&Term::Int(0));
        model
    }

    /// Interns a canonical term, returning its id; children first
    fn intern(&mut self, t: &Term) -> usize {
        if let Some(&id) = self.ids.get(t) {
            return id;
        }
        let (head, children) = match t {
            Term::App(f, args) => (
                Some(Head::App(f.clone())),
                args.iter().map(|a| self.intern(a)).collect(),
            ),
            Term::Bin(op, l, r) => {
                let l = self.intern(l);
                let r = self.intern(r);
                (Some(Head::Bin(*op)), vec![l, r])
            }
            Term::Not(x) => {
                let x = self.intern(x);
                (Some(Head::Not), vec![x])
            }
            _ => (None, Vec::new()),
        };
        let int_value = match t {
            Term::Int(n) => Some(*n),
            _ => None,
        };
        let id = self.entries.len();
        self.entries.push(Entry {
            head,
            children,
            int_value,
        });
        self.parent.push(id);
        self.ids.insert(t.clone(), id);
        if let Some(n) = int_value {
            // Tie every integer constant to the zero node so constants are
            // mutually ordered
            self.edges.push(Edge {
                from: id,
                to: self.zero_id,
                k: n,
            });
            self.edges.push(Edge {
                from: self.zero_id,
                to: id,
                k: -n,
            });
        }
        id
    }

    fn canon_intern(&mut self, t: &Term) -> usize {
        let c = canonical(t);
        self.intern(&c)
    }

    fn find(&mut self, mut id: usize) -> usize {
        while self.parent[id] != id {
            self.parent[id] = self.parent[self.parent[id]];
            id = self.parent[id];
        }
        id
    }

    fn merge(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        // Keep the representative carrying a known constant, if either does
        match (self.entries[ra].int_value, self.entries[rb].int_value) {
            (Some(x), Some(y)) if x != y => self.contradictory = true,
            (_, Some(_)) => self.parent[ra] = rb,
            _ => self.parent[rb] = ra,
        }
    }

    fn load(&mut self, case: &[Term]) -> Result<(), LimitReached> {
        for lit in case {
            self.counter.tick()?;
            match lit {
                Term::Bin(Op::Eq, l, r) => self.assert_eq(l, r),
                Term::Bin(Op::Ne, l, r) => {
                    let li = self.canon_intern(l);
                    let ri = self.canon_intern(r);
                    self.diseqs.push((li, ri));
                }
                Term::Bin(op, l, r) if matches!(op, Op::Lt | Op::Le | Op::Gt | Op::Ge) => {
                    self.assert_cmp(*op, l, r)
                }
                Term::Not(inner) => {
                    let id = self.canon_intern(inner);
                    self.merge(id, self.false_id);
                }
                Term::Bool(true) => (),
                Term::Bool(false) => self.contradictory = true,
                other => {
                    // A bare boolean fact, e.g. a `type(T, v)` entry
                    let id = self.canon_intern(other);
                    self.merge(id, self.true_id);
                }
            }
        }
        self.congruence_fixpoint()?;
        self.detect_contradiction()?;
        Ok(())
    }

    fn assert_eq(&mut self, l: &Term, r: &Term) {
        if let (Some(ll), Some(rl)) = (linearize(l), linearize(r)) {
            match ll.combine(rl, -1).shape() {
                Shape::Const(k) => {
                    if k != 0 {
                        self.contradictory = true;
                    }
                }
                Shape::Diff { pos, neg, konst } => {
                    // pos - neg + konst = 0
                    let u = pos.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    let v = neg.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    if konst == 0 {
                        self.merge(u, v);
                    } else {
                        self.edges.push(Edge {
                            from: u,
                            to: v,
                            k: -konst,
                        });
                        self.edges.push(Edge {
                            from: v,
                            to: u,
                            k: konst,
                        });
                    }
                }
                Shape::Other => (),
            }
        }
        let li = self.canon_intern(l);
        let ri = self.canon_intern(r);
        self.merge(li, ri);
    }

    fn assert_cmp(&mut self, op: Op, l: &Term, r: &Term) {
        // Normalize to `l < r` / `l <= r`
        let (op, l, r) = match op {
            Op::Gt => (Op::Lt, r, l),
            Op::Ge => (Op::Le, r, l),
            op => (op, l, r),
        };
        let tighten = if op == Op::Lt { 1 } else { 0 };
        if let (Some(ll), Some(rl)) = (linearize(l), linearize(r)) {
            match ll.combine(rl, -1).shape() {
                Shape::Const(k) => {
                    let truth = if op == Op::Lt { k < 0 } else { k <= 0 };
                    if !truth {
                        self.contradictory = true;
                    }
                    return;
                }
                Shape::Diff { pos, neg, konst } => {
                    // pos - neg + konst (<|<=) 0, so pos - neg <= -konst
                    // (minus one when strict)
                    let u = pos.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    let v = neg.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    self.edges.push(Edge {
                        from: u,
                        to: v,
                        k: -konst - tighten,
                    });
                    return;
                }
                Shape::Other => (),
            }
        }
        let li = self.canon_intern(l);
        let ri = self.canon_intern(r);
        self.cmp_facts.insert((op, li, ri));
    }

    /// Merges compound terms whose heads match and whose children are
    /// already in the same classes, to a fixpoint
    fn congruence_fixpoint(&mut self) -> Result<(), LimitReached> {
        loop {
            let mut merged_any = false;
            let compound: Vec<usize> = (0..self.entries.len())
                .filter(|&i| self.entries[i].head.is_some())
                .collect();
            for (a_pos, &a) in compound.iter().enumerate() {
                for &b in &compound[a_pos + 1..] {
                    self.counter.tick()?;
                    if self.find(a) == self.find(b) {
                        continue;
                    }
                    if self.entries[a].head != self.entries[b].head
                        || self.entries[a].children.len() != self.entries[b].children.len()
                    {
                        continue;
                    }
                    let pairs: Vec<(usize, usize)> = self.entries[a]
                        .children
                        .iter()
                        .copied()
                        .zip(self.entries[b].children.iter().copied())
                        .collect();
                    let same_children = pairs
                        .into_iter()
                        .all(|(x, y)| self.find(x) == self.find(y));
                    if same_children {
                        self.merge(a, b);
                        merged_any = true;
                    }
                }
            }
            if !merged_any {
                return Ok(());
            }
        }
    }

    /// Flags the case contradictory when a disequality collapsed, the truth
    /// constants merged, or the difference graph has a negative cycle
    fn detect_contradiction(&mut self) -> Result<(), LimitReached> {
        if self.contradictory {
            return Ok(());
        }
        if self.find(self.true_id) == self.find(self.false_id) {
            self.contradictory = true;
            return Ok(());
        }
        for i in 0..self.diseqs.len() {
            let (a, b) = self.diseqs[i];
            if self.find(a) == self.find(b) {
                self.contradictory = true;
                return Ok(());
            }
        }

        // Bellman-Ford negative-cycle detection over class representatives
        let edges = self.rep_edges();
        let mut dist: HashMap<usize, i128> = HashMap::new();
        for &(u, v, _) in &edges {
            dist.insert(u, 0);
            dist.insert(v, 0);
        }
        let n = dist.len();
        for round in 0..=n {
            let mut relaxed = false;
            for &(u, v, k) in &edges {
                self.counter.tick()?;
                let du = match dist.get(&u) {
                    Some(&d) => d,
                    None => continue,
                };
                if du + k < dist.get(&v).copied().unwrap_or(i128::MAX) {
                    dist.insert(v, du + k);
                    relaxed = true;
                }
            }
            if !relaxed {
                return Ok(());
            }
            if round == n {
                self.contradictory = true;
            }
        }
        Ok(())
    }

    /// The edges with both endpoints resolved to representatives;
    /// self-edges fold into an immediate consistency check
    fn rep_edges(&mut self) -> Vec<(usize, usize, i128)> {
        let mut out = Vec::with_capacity(self.edges.len());
        for i in 0..self.edges.len() {
            let (from, to, k) = {
                let e = &self.edges[i];
                (e.from, e.to, e.k)
            };
            let u = self.find(from);
            let v = self.find(to);
            if u == v {
                if k < 0 {
                    self.contradictory = true;
                }
                continue;
            }
            out.push((u, v, k));
        }
        out
    }

    /// Whether `from - to <= bound` is derivable from the difference graph
    fn le_query(&mut self, from: usize, to: usize, bound: i128) -> Result<bool, LimitReached> {
        let source = self.find(from);
        let target = self.find(to);
        if source == target {
            return Ok(bound >= 0);
        }
        let edges = self.rep_edges();
        let mut dist: HashMap<usize, i128> = HashMap::new();
        dist.insert(source, 0);
        // Plain Bellman-Ford; the graphs here are tiny
        for _ in 0..self.entries.len() {
            let mut relaxed = false;
            for &(u, v, k) in &edges {
                self.counter.tick()?;
                let du = match dist.get(&u) {
                    Some(&d) => d,
                    None => continue,
                };
                if du + k < dist.get(&v).copied().unwrap_or(i128::MAX) {
                    dist.insert(v, du + k);
                    relaxed = true;
                }
            }
            if !relaxed {
                break;
            }
        }
        Ok(dist.get(&target).map(|&w| w <= bound).unwrap_or(false))
    }

    /// Whether the goal holds in this model
    fn holds(&mut self, goal: &Term) -> Result<bool, LimitReached> {
        self.counter.tick()?;
        match goal {
            Term::Bool(b) => Ok(*b),
            Term::Bin(Op::And, l, r) => Ok(self.holds(l)? && self.holds(r)?),
            Term::Bin(Op::Or, l, r) => Ok(self.holds(l)? || self.holds(r)?),
            Term::Bin(Op::Implies, l, r) => Ok(self.refutes(l)? || self.holds(r)?),
            Term::Not(x) => self.refutes(x),
            Term::Bin(Op::Eq, l, r) => self.eq_query(l, r),
            Term::Bin(Op::Ne, l, r) => self.ne_query(l, r),
            Term::Bin(op, l, r) if matches!(op, Op::Lt | Op::Le | Op::Gt | Op::Ge) => {
                self.cmp_query(*op, l, r)
            }
            Term::Atom(_) | Term::Ident(_) | Term::App(..) => {
                let id = self.canon_intern(goal);
                self.congruence_fixpoint()?;
                let t = self.find(self.true_id);
                Ok(self.find(id) == t)
            }
            // An arithmetic term is not a proposition
            _ => Ok(false),
        }
    }

    /// Whether the negation of the goal holds
    fn refutes(&mut self, goal: &Term) -> Result<bool, LimitReached> {
        match goal {
            Term::Atom(_) | Term::Ident(_) | Term::App(..) => {
                let id = self.canon_intern(goal);
                self.congruence_fixpoint()?;
                let f = self.find(self.false_id);
                Ok(self.find(id) == f)
            }
            _ => {
                let negated = nnf(goal, false);
                self.holds(&negated)
            }
        }
    }

    fn eq_query(&mut self, l: &Term, r: &Term) -> Result<bool, LimitReached> {
        let li = self.canon_intern(l);
        let ri = self.canon_intern(r);
        self.congruence_fixpoint()?;
        if self.find(li) == self.find(ri) {
            return Ok(true);
        }
        if let (Some(ll), Some(rl)) = (linearize(l), linearize(r)) {
            match ll.combine(rl, -1).shape() {
                Shape::Const(k) => return Ok(k == 0),
                Shape::Diff { pos, neg, konst } => {
                    let u = pos.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    let v = neg.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    // u - v = -konst, pinched from both sides
                    return Ok(
                        self.le_query(u, v, -konst)? && self.le_query(v, u, konst)?
                    );
                }
                Shape::Other => (),
            }
        }
        Ok(false)
    }

    fn ne_query(&mut self, l: &Term, r: &Term) -> Result<bool, LimitReached> {
        let li = self.canon_intern(l);
        let ri = self.canon_intern(r);
        self.congruence_fixpoint()?;
        let rl = self.find(li);
        let rr = self.find(ri);
        for i in 0..self.diseqs.len() {
            let (a, b) = self.diseqs[i];
            let ra = self.find(a);
            let rb = self.find(b);
            if (ra == rl && rb == rr) || (ra == rr && rb == rl) {
                return Ok(true);
            }
        }
        // true and false are distinct
        let tid = self.find(self.true_id);
        let fid = self.find(self.false_id);
        if (rl == tid && rr == fid) || (rl == fid && rr == tid) {
            return Ok(true);
        }
        // A strict ordering either way separates the two sides
        if let (Some(ll), Some(rlin)) = (linearize(l), linearize(r)) {
            match ll.combine(rlin, -1).shape() {
                Shape::Const(k) => return Ok(k != 0),
                Shape::Diff { pos, neg, konst } => {
                    let u = pos.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    let v = neg.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    return Ok(self.le_query(u, v, -konst - 1)?
                        || self.le_query(v, u, konst - 1)?);
                }
                Shape::Other => (),
            }
        }
        Ok(false)
    }

    fn cmp_query(&mut self, op: Op, l: &Term, r: &Term) -> Result<bool, LimitReached> {
        let (op, l, r) = match op {
            Op::Gt => (Op::Lt, r, l),
            Op::Ge => (Op::Le, r, l),
            op => (op, l, r),
        };
        let tighten = if op == Op::Lt { 1 } else { 0 };

        let li = self.canon_intern(l);
        let ri = self.canon_intern(r);
        self.congruence_fixpoint()?;
        if op == Op::Le && self.find(li) == self.find(ri) {
            return Ok(true);
        }

        if let (Some(ll), Some(rl)) = (linearize(l), linearize(r)) {
            match ll.combine(rl, -1).shape() {
                Shape::Const(k) => {
                    return Ok(if op == Op::Lt { k < 0 } else { k <= 0 });
                }
                Shape::Diff { pos, neg, konst } => {
                    let u = pos.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    let v = neg.map(|t| self.intern(&t)).unwrap_or(self.zero_id);
                    if self.le_query(u, v, -konst - tighten)? {
                        return Ok(true);
                    }
                }
                Shape::Other => (),
            }
        }

        // Fall back to the uninterpreted comparison facts
        let rl = self.find(li);
        let rr = self.find(ri);
        let facts: Vec<(Op, usize, usize)> = self.cmp_facts.iter().copied().collect();
        for (fop, a, b) in facts {
            let ra = self.find(a);
            let rb = self.find(b);
            if ra != rl || rb != rr {
                continue;
            }
            // A strict fact answers a non-strict query too
            if fop == op || (fop == Op::Lt && op == Op::Le) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::formula::parse;

    fn assume_and_prove(facts: &[&str], goal: &str) -> Result<bool, LimitReached> {
        let facts: Vec<Term> = facts.iter().map(|f| parse(f).unwrap()).collect();
        let goal = parse(goal).unwrap();
        entails(&facts, &goal, &Budget::default())
    }

    #[test]
    fn equality_chains_through_classes() {
        assert_eq!(
            assume_and_prove(
                &[
                    "'startingA^' = 'this.^a'",
                    "'this.a^' = 'this.^b'",
                    "'this.b^' = 'startingA^'"
                ],
                "'this.b^' = 'this.^a'"
            ),
            Ok(true)
        );
    }

    #[test]
    fn unrelated_values_stay_unproven() {
        assert_eq!(
            assume_and_prove(&["'a^' = '^a'", "'b^' = '^a'"], "'b^' = '^aa'"),
            Ok(false)
        );
    }

    #[test]
    fn conjunction_goals_need_every_conjunct() {
        assert_eq!(
            assume_and_prove(&["'a^' = 1", "'b^' = 2"], "('a^' = 1) /\\ ('b^' = 2)"),
            Ok(true)
        );
        assert_eq!(
            assume_and_prove(&["'a^' = 1"], "('a^' = 1) /\\ ('b^' = 2)"),
            Ok(false)
        );
    }

    #[test]
    fn case_split_over_a_disjunction() {
        // (c /\ a=1) \/ (-c /\ a=1) entails a=1 regardless of c
        assert_eq!(
            assume_and_prove(
                &["('c' /\\ 'a^' = 1) \\/ (-('c') /\\ 'a^' = 1)"],
                "'a^' = 1"
            ),
            Ok(true)
        );
    }

    #[test]
    fn guard_ordering_flows_through_equalities() {
        // The swap-or-keep shape from sorting a pair
        let if_meaning = "(('this.^a' > 'this.^b') /\\ ('this.a^' = 'this.^b') /\\ ('this.b^' = 'this.^a')) \
                          \\/ ((-('this.^a' > 'this.^b')) /\\ ('this.a^' = 'this.^a') /\\ ('this.b^' = 'this.^b'))";
        assert_eq!(
            assume_and_prove(&[if_meaning], "'this.a^' =< 'this.b^'"),
            Ok(true)
        );
        // The strict version is not entailed (the else-arm allows equality)
        assert_eq!(
            assume_and_prove(&[if_meaning], "'this.a^' < 'this.b^'"),
            Ok(false)
        );
    }

    #[test]
    fn contradictory_cases_are_vacuous() {
        assert_eq!(
            assume_and_prove(&["'x^' > 1", "'x^' < 1"], "'y^' = 0"),
            Ok(true)
        );
    }

    #[test]
    fn linear_offsets_are_understood() {
        assert_eq!(
            assume_and_prove(&["'x^' = '^x' + 1"], "'x^' > '^x'"),
            Ok(true)
        );
        assert_eq!(
            assume_and_prove(&["'x^' = '^x' + 1", "'y^' = 'x^' + 1"], "'y^' = '^x' + 2"),
            Ok(true)
        );
        assert_eq!(
            assume_and_prove(&["'x^' = 2 * '^x'"], "'x^' = '^x' + '^x'"),
            Ok(true)
        );
    }

    #[test]
    fn boolean_facts_and_equivalence() {
        assert_eq!(assume_and_prove(&["'flag^' = true"], "'flag^'"), Ok(true));
        assert_eq!(
            assume_and_prove(&["'flag^' = true", "'other^' = 'flag^'"], "'other^'"),
            Ok(true)
        );
        assert_eq!(assume_and_prove(&["'flag^' = false"], "'flag^'"), Ok(false));
        assert_eq!(
            assume_and_prove(&["'flag^' = false"], "-('flag^')"),
            Ok(true)
        );
    }

    #[test]
    fn implication_goals() {
        assert_eq!(
            assume_and_prove(&["'a^' = 1"], "('b^' = 2) ==> ('a^' = 1)"),
            Ok(true)
        );
    }

    #[test]
    fn type_facts_are_inert_but_present() {
        assert_eq!(
            assume_and_prove(&["true /\\ type(int,'a^')", "'a^' = 1"], "type(int,'a^')"),
            Ok(true)
        );
    }

    #[test]
    fn congruence_over_applications() {
        assert_eq!(
            assume_and_prove(&["'x^' = '^y'", "f('x^') = 1"], "f('^y') = 1"),
            Ok(true)
        );
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let tight = Budget {
            max_cases: 1,
            max_steps: 10,
        };
        let facts = vec![parse("('a' /\\ 'x^' = 1) \\/ ('b' /\\ 'x^' = 1)").unwrap()];
        let goal = parse("'x^' = 1").unwrap();
        assert_eq!(entails(&facts, &goal, &tight), Err(LimitReached));
    }

    #[test]
    fn transitivity_over_the_graph() {
        assert_eq!(
            assume_and_prove(&["'a^' =< 'b^'", "'b^' =< 'c^'"], "'a^' =< 'c^'"),
            Ok(true)
        );
        assert_eq!(
            assume_and_prove(&["'a^' < 'b^'", "'b^' =< 'c^'"], "'a^' < 'c^'"),
            Ok(true)
        );
        assert_eq!(
            assume_and_prove(&["'a^' =< 'b^'", "'b^' =< 'c^'"], "'a^' < 'c^'"),
            Ok(false)
        );
    }

    #[test]
    fn disequality_from_strict_order_and_constants() {
        assert_eq!(assume_and_prove(&["'a^' < 'b^'"], "'a^' #= 'b^'"), Ok(true));
        assert_eq!(
            assume_and_prove(&["'a^' = 1", "'b^' = 2"], "'a^' #= 'b^'"),
            Ok(true)
        );
        assert_eq!(assume_and_prove(&[], "'a^' #= 'b^'"), Ok(false));
    }

    #[test]
    fn negated_guard_becomes_the_weak_inequality() {
        assert_eq!(
            assume_and_prove(
                &["-('this.^a' > 'this.^b')"],
                "'this.^a' =< 'this.^b'"
            ),
            Ok(true)
        );
    }
}
