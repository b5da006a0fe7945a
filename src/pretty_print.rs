use std::fmt::{self, Debug, Display};

use faer::prelude::*;

use crate::{Activation, core::param_buffer};

/// Renders one layer as an equation, e.g. for layer 2:
///
/// ```text
///             [ 0.1000 -0.2000]       [ 0.0000]
/// a_2 = relu( [ 0.3000  0.4000] a_1 + [-1.0000] )
///             [-0.5000  0.6000]       [ 0.5000]
/// ```
///
/// Gradients render as `dW_2 = [...]  db_2 = [...]` instead.
pub struct PrettyPrintLayer<'a> {
    i_layer: usize,
    kind: Kind,
    w: MatRef<'a, f64>,
    b: ColRef<'a, f64>,
}

enum Kind {
    Params { phi: Activation },
    Derivs,
}

impl<'a> PrettyPrintLayer<'a> {
    pub fn params(i_layer: usize, layer: param_buffer::LayerRef<'a>) -> Self {
        Self {
            i_layer,
            kind: Kind::Params { phi: layer.phi },
            w: layer.w,
            b: layer.b,
        }
    }

    pub fn derivs(i_layer: usize, dw: MatRef<'a, f64>, db: ColRef<'a, f64>) -> Self {
        Self {
            i_layer,
            kind: Kind::Derivs,
            w: dw,
            b: db,
        }
    }
}

impl Debug for PrettyPrintLayer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

fn write_element(f: &mut fmt::Formatter, x: f64, precision: usize) -> fmt::Result {
    match x.is_sign_positive() {
        true => write!(f, " {x:.precision$}"),
        false => write!(f, "{x:.precision$}"),
    }
}

fn write_row(
    f: &mut fmt::Formatter,
    row: impl IntoIterator<Item = f64>,
    precision: usize,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, x) in row.into_iter().enumerate() {
        if i != 0 {
            write!(f, " ")?;
        }
        write_element(f, x, precision)?;
    }
    write!(f, "]")
}

impl Display for PrettyPrintLayer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let n = self.w.nrows();
        let center_line = n / 2;
        let i_layer = self.i_layer;
        let input = match i_layer {
            0 | 1 => "x".to_string(),
            i => format!("a_{}", i - 1),
        };
        let (precision, head, middle, tail) = match self.kind {
            Kind::Params { phi } => (
                4,
                format!("a_{i_layer} = {phi}( "),
                format!(" {input} + "),
                " )".to_string(),
            ),
            Kind::Derivs => (
                12,
                format!("dW_{i_layer} = "),
                format!("  db_{i_layer} = "),
                String::new(),
            ),
        };
        for i_line in 0..n {
            let is_center = i_line == center_line;
            match is_center {
                true => write!(f, "{head}")?,
                false => write!(f, "{:width$}", "", width = head.chars().count())?,
            }
            write_row(f, (0..self.w.ncols()).map(|g| self.w[(i_line, g)]), precision)?;
            match is_center {
                true => write!(f, "{middle}")?,
                false => write!(f, "{:width$}", "", width = middle.chars().count())?,
            }
            write_row(f, [self.b[i_line]], precision)?;
            if is_center {
                write!(f, "{tail}")?;
            }
            if i_line + 1 != n {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
