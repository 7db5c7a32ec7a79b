use async_trait::async_trait;

use crate::errors::ShopResult;

/// 邮件发送接口（SMTP等具体通道是部署期关注点）
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ShopResult<()>;
}

/// 短信发送接口
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> ShopResult<()>;
}

/// 外部聊天消息接口（店主通知走这里）
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send(&self, chat_id: &str, message: &str) -> ShopResult<()>;
}
