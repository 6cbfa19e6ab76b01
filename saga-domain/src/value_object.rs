//! 值对象（Value Object）
//!
//! 无标识、以值相等为准的对象，用于封装不可变的概念性值与校验逻辑。
//!

use std::fmt;

use saga_macros::value_object;

/// 值对象抽象
pub trait ValueObject {
    /// 业务校验失败时的错误类型
    type Error;

    /// 创建值对象时进行验证
    fn validate(&self) -> Result<(), Self::Error>;
}

/// 版本号（实体已应用的事件数量，同时是事件序号）
///
/// 版本从 0 开始，每应用一个事件（含创建/关闭等生命周期事件）恰好加一，
/// 因此一个事件的序号就是应用它之后的实体版本。
///
/// # 示例
///
/// ```
/// use saga_domain::value_object::Version;
///
/// let v1 = Version::new();
/// assert_eq!(v1.value(), 0);
/// assert!(v1.is_new());
///
/// let v2 = v1.next();
/// assert_eq!(v2.value(), 1);
/// assert!(v2 > v1);
/// ```
#[value_object(copy = true, ordered = true)]
#[serde(transparent)]
pub struct Version(usize);

impl Version {
    /// 创建初始版本（版本号为 0）
    pub const fn new() -> Self {
        Self(0)
    }

    /// 从值创建版本号
    pub const fn from_value(value: usize) -> Self {
        Self(value)
    }

    /// 获取下一个版本号
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// 回退 `count` 个版本，结果不会小于 0
    ///
    /// ```
    /// use saga_domain::value_object::Version;
    ///
    /// assert_eq!(Version::from_value(5).rewind(2), Version::from_value(3));
    /// assert_eq!(Version::from_value(1).rewind(4), Version::new());
    /// ```
    pub fn rewind(&self, count: usize) -> Self {
        Self(self.0.saturating_sub(count))
    }

    /// 获取版本号的值
    pub const fn value(&self) -> usize {
        self.0
    }

    /// 检查是否为初始版本
    pub fn is_new(&self) -> bool {
        self.0 == 0
    }

    /// 两个版本之间相差的事件数（`self` 不早于 `earlier` 时）
    pub fn distance_from(&self, earlier: Version) -> usize {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<usize> for Version {
    fn from(value: usize) -> Self {
        Self::from_value(value)
    }
}

impl From<Version> for usize {
    fn from(version: Version) -> Self {
        version.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_new() {
        let v = Version::new();
        assert_eq!(v.value(), 0);
        assert!(v.is_new());
        assert_eq!(v, Version::default());
    }

    #[test]
    fn test_version_next_and_rewind() {
        let v = Version::new().next().next().next();
        assert_eq!(v.value(), 3);
        assert_eq!(v.rewind(1).value(), 2);
        assert_eq!(v.rewind(10), Version::new());
    }

    #[test]
    fn test_version_ordering_and_distance() {
        let v1 = Version::from_value(1);
        let v4 = Version::from_value(4);

        assert!(v4 > v1);
        assert_eq!(v4.distance_from(v1), 3);
        assert_eq!(v1.distance_from(v4), 0);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(format!("{}", Version::from_value(5)), "v5");
    }

    // 序列化为裸整数，便于存储层直接落列
    #[test]
    fn test_version_serde() {
        let v = Version::from_value(42);

        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "42");

        let deserialized: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, v);
    }

    #[test]
    fn test_version_conversions() {
        let v: Version = 7.into();
        let raw: usize = v.into();
        assert_eq!(raw, 7);
    }
}
