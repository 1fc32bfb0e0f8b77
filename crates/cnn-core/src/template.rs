//! CNN template data model and its text codec.
//!
//! A template is the pair of coupling matrices (feedback `A`, feed-forward
//! `B`), the bias `Z`, and the boundary policy that parameterizes the cell
//! dynamics. The text format is whitespace-delimited sections keyed by a
//! leading token; section order is not significant.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use nalgebra::DMatrix;

use crate::error::{CoreError, CoreResult};
use crate::numeric::Real;

/// Rule for resolving grid accesses outside the cell array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundaryCondition {
    /// Dirichlet: every out-of-grid sample is the template's virtual cell.
    #[default]
    Constant,
    /// Neumann: nearest-edge replication.
    ZeroFlux,
    /// Toroidal wrap-around.
    Periodic,
}

impl BoundaryCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryCondition::Constant => "Constant",
            BoundaryCondition::ZeroFlux => "ZeroFlux",
            BoundaryCondition::Periodic => "Periodic",
        }
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundaryCondition {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "Constant" => Ok(BoundaryCondition::Constant),
            "ZeroFlux" => Ok(BoundaryCondition::ZeroFlux),
            "Periodic" => Ok(BoundaryCondition::Periodic),
            _ => Err(CoreError::UnknownBoundary {
                token: s.to_string(),
            }),
        }
    }
}

/// Square coupling matrix of odd side `2k + 1`, indexed by neighbor offset.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CouplingMatrix {
    weights: DMatrix<Real>,
}

impl CouplingMatrix {
    /// Build from `side * side` row-major weights. The side must be odd
    /// and at least 3.
    pub fn from_row_major(side: usize, values: &[Real]) -> CoreResult<Self> {
        if side < 3 || side % 2 == 0 {
            return Err(CoreError::BadMatrixSide { side });
        }
        if values.len() != side * side {
            return Err(CoreError::SizeMismatch {
                what: "coupling matrix",
                expected: side * side,
                actual: values.len(),
            });
        }
        Ok(Self {
            weights: DMatrix::from_row_slice(side, side, values),
        })
    }

    /// All-zero matrix of the given odd side.
    pub fn zeros(side: usize) -> CoreResult<Self> {
        if side < 3 || side % 2 == 0 {
            return Err(CoreError::BadMatrixSide { side });
        }
        Ok(Self {
            weights: DMatrix::zeros(side, side),
        })
    }

    pub fn side(&self) -> usize {
        self.weights.nrows()
    }

    /// Stencil radius `k = side / 2`.
    pub fn radius(&self) -> usize {
        self.side() / 2
    }

    /// Weight at neighbor offset `(off_r, off_c)`, both in `[-k, k]`.
    #[inline]
    pub fn weight(&self, off_r: isize, off_c: isize) -> Real {
        let k = self.radius() as isize;
        debug_assert!(off_r.abs() <= k && off_c.abs() <= k);
        self.weights[((off_r + k) as usize, (off_c + k) as usize)]
    }

    /// Row-major view of the weights.
    pub fn row_major(&self) -> Vec<Real> {
        let side = self.side();
        let mut out = Vec::with_capacity(side * side);
        for r in 0..side {
            for c in 0..side {
                out.push(self.weights[(r, c)]);
            }
        }
        out
    }
}

/// Immutable CNN template; shared by reference across a run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Template {
    a: CouplingMatrix,
    b: CouplingMatrix,
    z: Real,
    boundary: BoundaryCondition,
    virtual_cell: Real,
}

impl Template {
    pub fn new(
        a: CouplingMatrix,
        b: CouplingMatrix,
        z: Real,
        boundary: BoundaryCondition,
        virtual_cell: Real,
    ) -> CoreResult<Self> {
        // One stencil radius per template: the evaluator derives it from
        // either matrix, so the sides must agree.
        if a.side() != b.side() {
            return Err(CoreError::MatrixSizeMismatch {
                a_side: a.side(),
                b_side: b.side(),
            });
        }
        Ok(Self {
            a,
            b,
            z,
            boundary,
            virtual_cell,
        })
    }

    /// Feedback (state) coupling matrix.
    pub fn a(&self) -> &CouplingMatrix {
        &self.a
    }

    /// Feed-forward (input) coupling matrix.
    pub fn b(&self) -> &CouplingMatrix {
        &self.b
    }

    /// Bias term.
    pub fn z(&self) -> Real {
        self.z
    }

    pub fn boundary(&self) -> BoundaryCondition {
        self.boundary
    }

    /// Only meaningful under `BoundaryCondition::Constant`.
    pub fn virtual_cell(&self) -> Real {
        self.virtual_cell
    }

    pub fn radius(&self) -> usize {
        self.a.radius()
    }

    pub fn load_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Serialize to the whitespace text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        write_matrix(&mut out, 'A', &self.a);
        write_matrix(&mut out, 'B', &self.b);
        out.push_str(&format!("Z\n\t{}\n\n", self.z));
        match self.boundary {
            BoundaryCondition::Constant => {
                out.push_str(&format!("C\n\tConstant\t{}\n", self.virtual_cell));
            }
            bc => {
                out.push_str(&format!("C\n\t{bc}\n"));
            }
        }
        out
    }
}

fn write_matrix(out: &mut String, name: char, mat: &CouplingMatrix) {
    out.push(name);
    out.push('\n');
    let side = mat.side();
    let values = mat.row_major();
    for r in 0..side {
        for c in 0..side {
            out.push_str(&format!("\t{}", values[r * side + c]));
        }
        out.push('\n');
    }
    out.push('\n');
}

impl FromStr for Template {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let mut tokens = s.split_whitespace().peekable();

        let mut a: Option<CouplingMatrix> = None;
        let mut b: Option<CouplingMatrix> = None;
        let mut z = 0.0;
        let mut boundary = BoundaryCondition::Constant;
        let mut virtual_cell = 0.0;

        while let Some(token) = tokens.next() {
            match token {
                "A" => a = Some(read_matrix('A', &mut tokens)?),
                "B" => b = Some(read_matrix('B', &mut tokens)?),
                "Z" => z = read_number('Z', &mut tokens)?,
                "C" => {
                    let tok = tokens
                        .next()
                        .ok_or(CoreError::MissingSection { section: 'C' })?;
                    boundary = tok.parse()?;
                    if boundary == BoundaryCondition::Constant {
                        virtual_cell = read_number('C', &mut tokens)?;
                    }
                }
                other => {
                    return Err(CoreError::UnknownSection {
                        token: other.to_string(),
                    });
                }
            }
        }

        let a = a.ok_or(CoreError::MissingSection { section: 'A' })?;
        let b = b.ok_or(CoreError::MissingSection { section: 'B' })?;
        Template::new(a, b, z, boundary, virtual_cell)
    }
}

fn read_number<'a>(
    section: char,
    tokens: &mut std::iter::Peekable<impl Iterator<Item = &'a str>>,
) -> CoreResult<Real> {
    let token = tokens
        .next()
        .ok_or(CoreError::MissingSection { section })?;
    token.parse().map_err(|_| CoreError::BadNumber {
        section,
        token: token.to_string(),
    })
}

/// Consume numeric tokens until the next section key (or EOF). The matrix
/// side is inferred from the count, which must be an odd perfect square.
fn read_matrix<'a>(
    section: char,
    tokens: &mut std::iter::Peekable<impl Iterator<Item = &'a str>>,
) -> CoreResult<CouplingMatrix> {
    let mut values: Vec<Real> = Vec::new();
    while let Some(&token) = tokens.peek() {
        match token.parse::<Real>() {
            Ok(v) => {
                values.push(v);
                tokens.next();
            }
            Err(_) => break,
        }
    }

    let side = (values.len() as f64).sqrt().round() as usize;
    if side * side != values.len() || side < 3 || side % 2 == 0 {
        return Err(CoreError::BadSectionShape {
            section,
            count: values.len(),
        });
    }
    CouplingMatrix::from_row_major(side, &values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLE_FILL: &str = "\
A
\t0\t1\t0
\t1\t3\t1
\t0\t1\t0

B
\t0\t0\t0
\t0\t4\t0
\t0\t0\t0

Z
\t-1

C
\tConstant\t1
";

    #[test]
    fn parse_three_by_three() {
        let tem: Template = HOLE_FILL.parse().unwrap();
        assert_eq!(tem.a().side(), 3);
        assert_eq!(tem.radius(), 1);
        assert_eq!(tem.a().weight(0, 0), 3.0);
        assert_eq!(tem.a().weight(-1, 0), 1.0);
        assert_eq!(tem.a().weight(-1, -1), 0.0);
        assert_eq!(tem.b().weight(0, 0), 4.0);
        assert_eq!(tem.z(), -1.0);
        assert_eq!(tem.boundary(), BoundaryCondition::Constant);
        assert_eq!(tem.virtual_cell(), 1.0);
    }

    #[test]
    fn parse_infers_five_by_five() {
        let mut text = String::from("A\n");
        for i in 0..25 {
            text.push_str(&format!(" {}", i));
        }
        text.push_str("\nB\n");
        for _ in 0..25 {
            text.push_str(" 0");
        }
        text.push_str("\nZ 0.5 C ZeroFlux");

        let tem: Template = text.parse().unwrap();
        assert_eq!(tem.a().side(), 5);
        assert_eq!(tem.radius(), 2);
        // row-major: offset (-2, -2) is the first value
        assert_eq!(tem.a().weight(-2, -2), 0.0);
        assert_eq!(tem.a().weight(-2, 2), 4.0);
        assert_eq!(tem.a().weight(2, 2), 24.0);
        assert_eq!(tem.boundary(), BoundaryCondition::ZeroFlux);
    }

    #[test]
    fn section_order_is_not_significant() {
        let reordered = "\
Z 2
B 0 0 0 0 1 0 0 0 0
C Periodic
A 0 0 0 0 0 0 0 0 0
";
        let tem: Template = reordered.parse().unwrap();
        assert_eq!(tem.z(), 2.0);
        assert_eq!(tem.boundary(), BoundaryCondition::Periodic);
        assert_eq!(tem.b().weight(0, 0), 1.0);
    }

    #[test]
    fn unknown_section_is_fatal() {
        let err = "Q 1 2 3".parse::<Template>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownSection { .. }));
    }

    #[test]
    fn unknown_boundary_is_fatal() {
        let text = "A 0 0 0 0 0 0 0 0 0 B 0 0 0 0 0 0 0 0 0 C Reflective";
        let err = text.parse::<Template>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownBoundary { .. }));
    }

    #[test]
    fn missing_couplings_are_fatal() {
        let err = "Z 0".parse::<Template>().unwrap_err();
        assert!(matches!(err, CoreError::MissingSection { section: 'A' }));
    }

    #[test]
    fn even_or_non_square_counts_rejected() {
        // 4 values: even side
        let err = "A 1 2 3 4".parse::<Template>().unwrap_err();
        assert!(matches!(err, CoreError::BadSectionShape { .. }));
        // 8 values: not a perfect square
        let err = "A 1 2 3 4 5 6 7 8".parse::<Template>().unwrap_err();
        assert!(matches!(err, CoreError::BadSectionShape { .. }));
    }

    #[test]
    fn mismatched_sides_rejected() {
        let a = CouplingMatrix::zeros(3).unwrap();
        let b = CouplingMatrix::zeros(5).unwrap();
        let err = Template::new(a, b, 0.0, BoundaryCondition::Constant, 0.0).unwrap_err();
        assert!(matches!(err, CoreError::MatrixSizeMismatch { .. }));
    }

    #[test]
    fn text_round_trip() {
        let tem: Template = HOLE_FILL.parse().unwrap();
        let back: Template = tem.to_text().parse().unwrap();
        assert_eq!(back, tem);
    }

    #[test]
    fn defaults_when_sections_absent() {
        let tem: Template = "A 0 0 0 0 0 0 0 0 0 B 0 0 0 0 0 0 0 0 0"
            .parse()
            .unwrap();
        assert_eq!(tem.z(), 0.0);
        assert_eq!(tem.boundary(), BoundaryCondition::Constant);
        assert_eq!(tem.virtual_cell(), 0.0);
    }
}
