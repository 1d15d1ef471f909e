//! Transform catalog: the shared execution template and every concrete transform.

pub mod base;
pub mod color_space;
pub mod column_sort;
pub mod deriche;
pub mod difference;
pub mod linear;
pub mod passthrough;
pub mod subtract;
pub mod threshold;
