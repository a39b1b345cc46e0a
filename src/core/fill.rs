use crate::types::{RasterImage, RasterStack};
use ndarray::Axis;
use std::collections::VecDeque;

/// Post-resampling repair of no-data cells.
///
/// Every no-data cell is assigned the value of its nearest valid cell by
/// outward propagation, with no distance ceiling. A band with no valid cell
/// at all is left untouched, and filling an already-filled band is a no-op.
pub struct GapFiller;

impl GapFiller {
    /// Fill one band in place. Returns the number of cells filled.
    pub fn fill(band: &mut RasterImage) -> usize {
        let (rows, cols) = band.dim();
        if rows == 0 || cols == 0 {
            return 0;
        }

        // Multi-source breadth-first propagation from every valid cell;
        // each gap takes the value of the first front that reaches it.
        let mut source: Vec<u32> = vec![u32::MAX; rows * cols];
        let mut queue: VecDeque<u32> = VecDeque::new();
        for r in 0..rows {
            for c in 0..cols {
                if band[[r, c]].is_finite() {
                    let flat = (r * cols + c) as u32;
                    source[flat as usize] = flat;
                    queue.push_back(flat);
                }
            }
        }
        if queue.is_empty() || queue.len() == rows * cols {
            return 0;
        }

        let mut filled = 0;
        while let Some(flat) = queue.pop_front() {
            let r = flat as usize / cols;
            let c = flat as usize % cols;
            let src = source[flat as usize];
            // 8-connected neighbourhood
            for dr in -1i64..=1 {
                for dc in -1i64..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let nr = r as i64 + dr;
                    let nc = c as i64 + dc;
                    if nr < 0 || nc < 0 || nr >= rows as i64 || nc >= cols as i64 {
                        continue;
                    }
                    let nflat = (nr as usize * cols + nc as usize) as u32;
                    if source[nflat as usize] != u32::MAX {
                        continue;
                    }
                    source[nflat as usize] = src;
                    queue.push_back(nflat);
                    filled += 1;
                }
            }
        }

        for flat in 0..rows * cols {
            let src = source[flat];
            if src != u32::MAX && src as usize != flat {
                let value = band[[src as usize / cols, src as usize % cols]];
                band[[flat / cols, flat % cols]] = value;
            }
        }
        filled
    }

    /// Fill every band of a (ny, nx, N) stack in place.
    pub fn fill_stack(stack: &mut RasterStack) -> usize {
        let mut filled = 0;
        for mut band in stack.axis_iter_mut(Axis(2)) {
            // axis_iter_mut over the band axis yields (ny, nx) views
            let mut owned = band.to_owned();
            filled += Self::fill(&mut owned);
            band.assign(&owned);
        }
        filled
    }
}
