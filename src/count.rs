// 该文件是 Cheshu （车数） 项目的一部分。
// src/count.rs - 车辆计数
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{fmt, str::FromStr};

use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::model::{DetectItem, WithLabel};

/// 计入车辆的类别，声明顺序即标签的字典序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VehicleClass {
  Bicycle,
  Bus,
  Car,
  Motorcycle,
  Truck,
}

impl VehicleClass {
  pub const ALL: [VehicleClass; 5] = [
    VehicleClass::Bicycle,
    VehicleClass::Bus,
    VehicleClass::Car,
    VehicleClass::Motorcycle,
    VehicleClass::Truck,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      VehicleClass::Bicycle => "bicycle",
      VehicleClass::Bus => "bus",
      VehicleClass::Car => "car",
      VehicleClass::Motorcycle => "motorcycle",
      VehicleClass::Truck => "truck",
    }
  }

  /// 检测标签对应的车辆类别，未登记名称的类别永远不匹配
  pub fn from_label<T: WithLabel>(label: &T) -> Option<Self> {
    label.label_name().and_then(|name| name.parse().ok())
  }

  fn index(self) -> usize {
    self as usize
  }
}

impl fmt::Display for VehicleClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("不是车辆类别: {0}")]
pub struct NotVehicleClass(pub String);

impl FromStr for VehicleClass {
  type Err = NotVehicleClass;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    VehicleClass::ALL
      .into_iter()
      .find(|class| class.as_str() == s)
      .ok_or_else(|| NotVehicleClass(s.to_string()))
  }
}

/// 各车辆类别的数量
///
/// 总数由各类别求和得到，不单独保存。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountReport {
  counts: [usize; VehicleClass::ALL.len()],
}

impl CountReport {
  /// 统计检测结果中的车辆，非车辆类别直接忽略
  pub fn from_detections<'a, T, I>(items: I) -> Self
  where
    T: WithLabel + 'a,
    I: IntoIterator<Item = &'a DetectItem<T>>,
  {
    items
      .into_iter()
      .filter_map(|item| VehicleClass::from_label(&item.kind))
      .collect()
  }

  pub fn add(&mut self, class: VehicleClass) {
    self.counts[class.index()] += 1;
  }

  pub fn get(&self, class: VehicleClass) -> usize {
    self.counts[class.index()]
  }

  pub fn total(&self) -> usize {
    self.counts.iter().sum()
  }

  /// 按标签字典序遍历全部类别（含零计数）
  pub fn iter(&self) -> impl Iterator<Item = (VehicleClass, usize)> + '_ {
    VehicleClass::ALL
      .into_iter()
      .map(|class| (class, self.get(class)))
  }

  pub fn to_json(&self) -> Value {
    let counts: Map<String, Value> = self
      .iter()
      .map(|(class, count)| (class.as_str().to_string(), json!(count)))
      .collect();
    json!({
      "total": self.total(),
      "counts": counts,
    })
  }
}

impl FromIterator<VehicleClass> for CountReport {
  fn from_iter<I: IntoIterator<Item = VehicleClass>>(iter: I) -> Self {
    let mut report = CountReport::default();
    for class in iter {
      report.add(class);
    }
    report
  }
}

impl fmt::Display for CountReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "车辆总数: {}", self.total())?;
    writeln!(f, "分类统计:")?;
    for (class, count) in self.iter() {
      writeln!(f, "  {}: {}", class, count)?;
    }
    Ok(())
  }
}
