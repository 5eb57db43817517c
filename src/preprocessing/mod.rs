//! Feature preprocessing: outlier capping and column encoding

pub mod encoder;
pub mod outlier;

pub use encoder::{
    BinaryEncoder, ColumnTransformer, FittedColumnTransformer, HandleUnknown, OneHotEncoder,
    StandardScaler,
};
pub use outlier::{cap_outliers, continuous_columns};
