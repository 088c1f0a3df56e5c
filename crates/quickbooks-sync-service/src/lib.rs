//! QuickBooks 订单同步适配器
//!
//! 接收电商平台推送的订单、商品、退货和库存消息，转换为 QuickBooks 记账 API 调用，
//! 并异步回报同步状态。
//!
//! ## 核心功能
//!
//! - **订单对账**：订单 -> 销售收据，按交叉引用决定新建、部分更新或作废
//! - **实体解析**：账户、支付方式、客户、商品的查找与按需创建
//! - **退货对账**：退货 -> 退款收据
//! - **商品导入 / 库存读取**：按 SKU 同步商品与在手数量
//! - **状态检查**：单次轮询同步状态，未完成时返回重投延迟
//!
//! ## 模块结构
//!
//! - `client`: 记账服务客户端 trait 与 HTTP 实现
//! - `xref`: 交叉引用存储
//! - `resolver`: 实体解析器
//! - `service`: 对账与读取业务
//! - `endpoint`: 操作枚举、分发与路由
//! - `models`: 入站消息与记账实体
//! - `state`: 应用状态
//! - `error`: 错误类型定义

pub mod client;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod resolver;
pub mod service;
pub mod state;
pub mod test_utils;
pub mod xref;

pub use endpoint::{Operation, dispatch, router};
pub use error::{Result, SyncError};
pub use state::AppState;
